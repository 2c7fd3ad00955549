//! The per-field tower service wrapping a resolver.

use crate::error::FieldError;
use crate::json::Value;
use crate::request::FieldRequest;
use crate::schema::Resolver;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::Service;

/// A boxed, cloneable field-resolution service: one per field of the
/// composed schema, shared by every in-flight request.
///
/// tower's `BoxCloneService` is `Send` but not `Sync`, which would keep an
/// embedding server from holding the gateway in an `Arc` across tasks. The
/// stacks boxed here carry nothing but `Arc`'d state, so this box demands
/// `Sync` as well.
pub struct FieldService {
    inner: Box<dyn CloneFieldService>,
}

impl FieldService {
    pub fn new<S>(service: S) -> Self
    where
        S: Service<FieldRequest, Response = Value, Error = FieldError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        Self {
            inner: Box::new(service),
        }
    }
}

impl Clone for FieldService {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl Service<FieldRequest> for FieldService {
    type Response = Value;
    type Error = FieldError;
    type Future = BoxFuture<'static, Result<Value, FieldError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_dyn(cx)
    }

    fn call(&mut self, request: FieldRequest) -> Self::Future {
        self.inner.call_dyn(request)
    }
}

/// Object-safe view of a cloneable field service.
trait CloneFieldService: Send + Sync {
    fn clone_box(&self) -> Box<dyn CloneFieldService>;
    fn poll_ready_dyn(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), FieldError>>;
    fn call_dyn(&mut self, request: FieldRequest)
        -> BoxFuture<'static, Result<Value, FieldError>>;
}

impl<S> CloneFieldService for S
where
    S: Service<FieldRequest, Response = Value, Error = FieldError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    fn clone_box(&self) -> Box<dyn CloneFieldService> {
        Box::new(self.clone())
    }

    fn poll_ready_dyn(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), FieldError>> {
        self.poll_ready(cx)
    }

    fn call_dyn(
        &mut self,
        request: FieldRequest,
    ) -> BoxFuture<'static, Result<Value, FieldError>> {
        Box::pin(self.call(request))
    }
}

/// The innermost service of the interception stack: invokes the original
/// resolver with the original request, returning its result unchanged. The
/// hook point for a field-level sanitization transform would sit here; by
/// default it is the identity.
#[derive(Clone)]
pub struct ResolverService {
    resolver: Resolver,
}

impl ResolverService {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }
}

impl Service<FieldRequest> for ResolverService {
    type Response = Value;
    type Error = FieldError;
    type Future = BoxFuture<'static, Result<Value, FieldError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: FieldRequest) -> Self::Future {
        (self.resolver)(request)
    }
}
