//! Resolver maps for schema sources.
//!
//! Each schema source pairs its type definitions with a map of field
//! resolvers. A resolver can be an explicit async function, a forwarding
//! resolver delegating the whole field to a named [`Backend`] in the shared
//! context, or (when a field has neither) the default property lookup on the
//! parent value.

use crate::error::FieldError;
use crate::json::{Object, Value};
use crate::request::{FieldMetadata, FieldRequest};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A field resolver: consumes one [`FieldRequest`], produces the resolved
/// value or a field error.
pub type Resolver =
    Arc<dyn Fn(FieldRequest) -> BoxFuture<'static, Result<Value, FieldError>> + Send + Sync>;

/// Wraps a plain async function as a [`Resolver`].
pub fn resolver<F, Fut>(f: F) -> Resolver
where
    F: Fn(FieldRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FieldError>> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

/// A downstream data source a forwarding resolver delegates to, addressed by
/// the context key it was registered under.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn resolve(&self, field: &FieldMetadata, args: &Object) -> Result<Value, FieldError>;
}

/// Builds a resolver that forwards the entire field to the backend stored in
/// the shared context under `key`.
pub fn forward_to(key: impl Into<String>) -> Resolver {
    let key = key.into();
    Arc::new(move |request: FieldRequest| {
        let key = key.clone();
        Box::pin(async move {
            let backend = request
                .context
                .backend(&key)
                .ok_or_else(|| FieldError::MissingBackend { key: key.clone() })?;
            backend.resolve(&request.metadata, &request.args).await
        })
    })
}

/// The engine-default resolver: look the field up as a property of the
/// parent object.
pub fn default_resolver() -> Resolver {
    Arc::new(|request| {
        Box::pin(async move {
            Ok(match &request.parent {
                Value::Object(object) => object
                    .get(request.metadata.field_name.as_str())
                    .cloned()
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            })
        })
    })
}

/// Field resolvers keyed by `(type name, field name)`.
#[derive(Clone, Default)]
pub struct ResolverMap {
    entries: HashMap<(String, String), Resolver>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Resolver,
    ) {
        self.entries
            .insert((type_name.into(), field_name.into()), resolver);
    }

    /// Chainable form of [`insert`](Self::insert).
    pub fn with(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Resolver,
    ) -> Self {
        self.insert(type_name, field_name, resolver);
        self
    }

    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&Resolver> {
        self.entries
            .get(&(type_name.to_string(), field_name.to_string()))
    }

    /// Folds `other` in; later registrations win on collision, matching the
    /// type-masking semantics of schema merging.
    pub fn merge(&mut self, other: ResolverMap) {
        self.entries.extend(other.entries);
    }
}
