//! The authorization checkpoint.
//!
//! Sits outermost on every field's service stack: the decision runs before
//! the cache and before the wrapped resolver, exactly once per field
//! resolution. Decisions are never memoized — repeated identical requests
//! re-evaluate policy every time; only the *data* resolution below is ever
//! short-circuited by the cache.

use crate::context::EvalContext;
use crate::error::{AuthorizationError, AuthorizeError, FieldError};
use crate::json::Value;
use crate::policy::{AccessRequest, AuthorizeFn};
use crate::request::FieldRequest;
use futures::future::BoxFuture;
use std::ops::ControlFlow;
use std::task::{Context, Poll};
use tower::{Layer, Service};

pub struct AuthorizationLayer {
    authorize: AuthorizeFn,
}

impl AuthorizationLayer {
    pub fn new(authorize: AuthorizeFn) -> Self {
        Self { authorize }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationService {
            inner,
            authorize: self.authorize.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationService<S> {
    inner: S,
    authorize: AuthorizeFn,
}

impl<S> AuthorizationService<S> {
    /// Runs the decision for `request`. `Continue` hands the untouched
    /// request to the inner service; `Break` carries the error to return
    /// without ever invoking it.
    fn checkpoint(&self, request: FieldRequest) -> ControlFlow<FieldError, FieldRequest> {
        let resource = request.metadata.resource();
        let action = request.metadata.operation_kind;
        let eval = EvalContext::new(
            request.context.clone(),
            request.parent.clone(),
            request.args.clone(),
        );
        let access = AccessRequest {
            action,
            resource: &resource,
            context: &eval,
        };
        match (self.authorize)(&access) {
            Ok(true) => ControlFlow::Continue(request),
            Ok(false) => {
                tracing::debug!(%resource, %action, "access denied");
                ControlFlow::Break(AuthorizationError::default().into())
            }
            Err(AuthorizeError::Unconfigured) => {
                tracing::error!(%resource, "authorization requested but no policy engine is configured");
                ControlFlow::Break(FieldError::PolicyEngineUnconfigured)
            }
            // a decision error is a denial, never an allow
            Err(AuthorizeError::Engine(err)) => {
                tracing::warn!(%resource, %action, error = %err, "policy engine error treated as deny");
                ControlFlow::Break(
                    AuthorizationError::new(
                        AuthorizationError::DEFAULT_DENY_TYPE,
                        err.to_string(),
                    )
                    .into(),
                )
            }
        }
    }
}

impl<S> Service<FieldRequest> for AuthorizationService<S>
where
    S: Service<FieldRequest, Response = Value, Error = FieldError>,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = FieldError;
    type Future = BoxFuture<'static, Result<Value, FieldError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: FieldRequest) -> Self::Future {
        match self.checkpoint(request) {
            ControlFlow::Continue(request) => Box::pin(self.inner.call(request)),
            ControlFlow::Break(denial) => Box::pin(futures::future::ready(Err(denial))),
        }
    }
}
