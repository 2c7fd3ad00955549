//! The gateway instance: composed schema, frozen context registry, and the
//! intercepted field services the execution engine drives.
//!
//! All replaceable seams (authentication, the authorization decision, the
//! cache backend, the type-conflict resolver) are injected through the
//! builder and never mutated after construction.

use crate::cache::CacheBackend;
use crate::context::{ContextRegistry, Principal, RequestContext};
use crate::error::{AuthenticationError, FieldError, SchemaError};
use crate::json::Value;
use crate::layers::{AuthorizationLayer, CachingLayer};
use crate::policy::{default_authorize, AuthorizeFn, PolicyEngine};
use crate::request::{FieldMetadata, FieldRequest, OperationKind};
use crate::schema::{
    default_resolver, field_cache_hint, root_operation, Backend, ComposedSchema, OnTypeConflict,
    SchemaSource,
};
use crate::services::{FieldService, ResolverService};
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tower::{Layer, ServiceExt};

/// The narrow credential boundary: whatever the transport extracted from the
/// inbound request that an authentication provider may want to inspect.
#[derive(Clone, Debug, Default)]
pub struct ClientRequest {
    headers: HashMap<String, String>,
}

impl ClientRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// The request-scoped authentication seam: inspects the inbound request and
/// produces the principal for this request.
pub type AuthenticateFn = Arc<
    dyn Fn(ClientRequest) -> BoxFuture<'static, Result<Principal, AuthenticationError>>
        + Send
        + Sync,
>;

fn anonymous_authenticate() -> AuthenticateFn {
    Arc::new(|_request| Box::pin(async { Ok(Principal::anonymous()) }))
}

/// A gateway over one composed schema. Immutable once built; hot reload
/// means building a fresh instance.
pub struct Gateway {
    schema: Valid<Schema>,
    services: Arc<HashMap<String, FieldService>>,
    registry: Arc<ContextRegistry>,
    authenticate: AuthenticateFn,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// The validated, composed schema the gateway serves.
    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    /// The name of the root operation type for `kind`, if any.
    pub fn root_operation(&self, kind: OperationKind) -> Option<&str> {
        root_operation(&self.schema, kind)
    }

    /// Builds the engine-boundary metadata for one field, deriving its cache
    /// hint from the composed schema.
    pub fn field_metadata(
        &self,
        parent_type: &str,
        field_name: &str,
        operation_kind: OperationKind,
    ) -> FieldMetadata {
        FieldMetadata {
            parent_type: parent_type.to_string(),
            field_name: field_name.to_string(),
            operation_kind,
            cache_hint: field_cache_hint(&self.schema, parent_type, field_name),
        }
    }

    /// Opens a request: seeds the anonymous principal, then lets the
    /// authentication seam replace it. A provider failure falls back to
    /// anonymous so that authorization, not authentication, uniformly
    /// decides access.
    pub async fn begin_request(&self, request: ClientRequest) -> RequestContext {
        match (self.authenticate)(request).await {
            Ok(principal) => RequestContext::with_principal(self.registry.clone(), principal),
            Err(err) => {
                tracing::warn!(error = %err, "authentication failed, continuing as anonymous");
                RequestContext::new(self.registry.clone())
            }
        }
    }

    /// Resolves one field through its interception stack. Each invocation is
    /// independent: a denial here never prevents sibling fields from
    /// resolving.
    pub async fn resolve_field(&self, request: FieldRequest) -> Result<Value, FieldError> {
        let resource = request.metadata.resource();
        let service = self
            .services
            .get(&resource)
            .ok_or(FieldError::UnknownField { resource })?;
        service.clone().oneshot(request).await
    }
}

/// Collects schema sources, context entries and seams, then builds the
/// immutable [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    sources: Vec<SchemaSource>,
    registry: ContextRegistry,
    policy_engine: Option<Arc<dyn PolicyEngine>>,
    authorize: Option<AuthorizeFn>,
    authenticate: Option<AuthenticateFn>,
    cache: Option<Arc<dyn CacheBackend>>,
    on_type_conflict: Option<OnTypeConflict>,
}

impl GatewayBuilder {
    /// Registers a schema source. Sources merge in registration order; a
    /// later type definition masks an earlier one of the same name.
    pub fn schema(mut self, source: SchemaSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds a named JSON value to the shared context registry.
    pub fn context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.registry.insert_value(key, value);
        self
    }

    /// Adds a downstream backend under `key`; forwarding resolvers built
    /// with [`crate::schema::forward_to`] delegate to it.
    pub fn backend(mut self, key: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        self.registry.insert_backend(key, backend);
        self
    }

    /// Registers a backend together with its schema, wiring every root field
    /// of that schema to forward to the backend.
    pub fn backend_schema(
        mut self,
        key: impl Into<String>,
        type_defs: impl Into<String>,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, SchemaError> {
        let key = key.into();
        let type_defs = type_defs.into();
        let parsed = Schema::parse(&type_defs, "backend.graphql")
            .map_err(|errors| SchemaError::Parse(errors.to_string()))?;

        let mut source = SchemaSource::new(type_defs);
        for kind in [
            OperationKind::Query,
            OperationKind::Mutation,
            OperationKind::Subscription,
        ] {
            let Some(root) = root_operation(&parsed, kind) else {
                continue;
            };
            let Some(ExtendedType::Object(object)) = parsed.types.get(root) else {
                continue;
            };
            for field_name in object.fields.keys() {
                source = source.resolver(
                    root,
                    field_name.as_str(),
                    crate::schema::forward_to(key.clone()),
                );
            }
        }

        self.registry.insert_backend(key, backend);
        self.sources.push(source);
        Ok(self)
    }

    /// Installs the external policy engine the default authorization
    /// decision delegates to.
    pub fn policy_engine(mut self, engine: Arc<dyn PolicyEngine>) -> Self {
        self.policy_engine = Some(engine);
        self
    }

    /// Replaces the authorization decision seam outright.
    pub fn authorize_fn(mut self, authorize: AuthorizeFn) -> Self {
        self.authorize = Some(authorize);
        self
    }

    /// Replaces the authentication seam; the default leaves every request
    /// anonymous.
    pub fn authenticate_fn(mut self, authenticate: AuthenticateFn) -> Self {
        self.authenticate = Some(authenticate);
        self
    }

    /// Enables response caching backed by `cache`.
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the type-conflict resolver used while merging sources.
    pub fn on_type_conflict(mut self, on_type_conflict: OnTypeConflict) -> Self {
        self.on_type_conflict = Some(on_type_conflict);
        self
    }

    /// Merges and validates the composed schema, wraps every field in the
    /// interception stack and freezes the registry.
    ///
    /// [`SchemaError::NoSchema`] here is fatal: the caller must refuse to
    /// start the server.
    pub fn build(self) -> Result<Gateway, SchemaError> {
        let composed = ComposedSchema::merge(None, self.sources, self.on_type_conflict)?;
        let (schema, resolvers) = composed.finalize()?;

        let authorize = self
            .authorize
            .unwrap_or_else(|| default_authorize(self.policy_engine));
        let authorization = AuthorizationLayer::new(authorize);
        let caching = CachingLayer::new(self.cache);

        let mut services: HashMap<String, FieldService> = HashMap::new();
        for (type_name, ty) in &schema.types {
            let ExtendedType::Object(object) = ty else {
                continue;
            };
            if ty.is_built_in() || type_name.as_str().starts_with("__") {
                continue;
            }
            for field_name in object.fields.keys() {
                let resolver = resolvers
                    .get(type_name.as_str(), field_name.as_str())
                    .cloned()
                    .unwrap_or_else(default_resolver);
                let stack =
                    authorization.layer(caching.layer(ResolverService::new(resolver)));
                services.insert(
                    format!("{}::{}", type_name, field_name),
                    FieldService::new(stack),
                );
            }
        }

        Ok(Gateway {
            schema,
            services: Arc::new(services),
            registry: Arc::new(self.registry),
            authenticate: self.authenticate.unwrap_or_else(anonymous_authenticate),
        })
    }
}
