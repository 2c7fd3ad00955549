//! The response-caching layer.
//!
//! Sits inside the authorization checkpoint, so a cache hit can never bypass
//! access control. Only root-operation-kind `query` fields carrying a
//! max-age cache hint are eligible; mutations and subscriptions are never
//! cached. Cache failures are swallowed and logged: a broken cache degrades
//! to always-recompute, never to denying or corrupting a response.

use crate::cache::{cache_key, CacheBackend};
use crate::error::FieldError;
use crate::json::Value;
use crate::request::{CacheScope, FieldRequest, OperationKind};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

pub struct CachingLayer {
    cache: Option<Arc<dyn CacheBackend>>,
}

impl CachingLayer {
    /// `None` disables caching entirely; every request goes to the resolver.
    pub fn new(cache: Option<Arc<dyn CacheBackend>>) -> Self {
        Self { cache }
    }
}

impl<S> Layer<S> for CachingLayer {
    type Service = CachingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CachingService {
            inner,
            cache: self.cache.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CachingService<S> {
    inner: S,
    cache: Option<Arc<dyn CacheBackend>>,
}

/// The key and lifetime for a cache-eligible request, or `None` when the
/// request must go straight to the resolver.
fn cache_plan(
    cache: &Option<Arc<dyn CacheBackend>>,
    request: &FieldRequest,
) -> Option<(String, Duration)> {
    cache.as_ref()?;
    if request.metadata.operation_kind != OperationKind::Query {
        return None;
    }
    let hint = request.metadata.cache_hint.as_ref()?;
    let private_id = match hint.scope {
        CacheScope::Private => Some(
            request
                .context
                .principal
                .id
                .as_deref()
                .unwrap_or("anonymous"),
        ),
        CacheScope::Public => None,
    };
    let key = cache_key(&request.metadata.resource(), &request.args, private_id);
    Some((key, Duration::from_secs(hint.max_age)))
}

impl<S> Service<FieldRequest> for CachingService<S>
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
        let Some((key, ttl)) = cache_plan(&self.cache, &request) else {
            return Box::pin(self.inner.call(request));
        };
        let cache = self
            .cache
            .clone()
            .expect("cache_plan only fires with a cache configured; qed");

        match cache.get(&key) {
            Ok(Some(value)) => {
                tracing::trace!(resource = %request.metadata.resource(), "cache hit");
                return Box::pin(futures::future::ready(Ok(value)));
            }
            Ok(None) => {}
            Err(err) => {
                // treated as a miss
                tracing::warn!(error = %err, "cache read failed");
            }
        }

        let delegate = self.inner.call(request);
        Box::pin(async move {
            let value = delegate.await?;
            if let Err(err) = cache.put(&key, value.clone(), ttl) {
                tracing::warn!(error = %err, "cache write failed");
            }
            Ok(value)
        })
    }
}
