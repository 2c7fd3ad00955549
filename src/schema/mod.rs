//! Schema composition.
//!
//! Independently-defined schema sources (type definitions + resolver maps)
//! are folded into one schema by a structural merge over parsed type maps.
//! Conflicts are settled at type granularity by a pure conflict-resolver
//! function; the default favours the incoming type, which is the masking
//! mechanism that lets a gateway operator reshape a type (say, drop a
//! `password` field) by re-declaring it later in the registration order.

mod resolvers;

pub use resolvers::{
    default_resolver, forward_to, resolver, Backend, Resolver, ResolverMap,
};

use crate::error::SchemaError;
use crate::request::{CacheHint, CacheScope, OperationKind};
use apollo_compiler::ast;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;
use std::sync::Arc;

/// One schema source: SDL type definitions plus the resolvers for them.
pub struct SchemaSource {
    pub type_defs: String,
    pub resolvers: ResolverMap,
}

impl SchemaSource {
    pub fn new(type_defs: impl Into<String>) -> Self {
        Self {
            type_defs: type_defs.into(),
            resolvers: ResolverMap::new(),
        }
    }

    pub fn resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn resolver(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Resolver,
    ) -> Self {
        self.resolvers.insert(type_name, field_name, resolver);
        self
    }
}

/// A pure conflict resolver: given the incumbent and incoming definitions of
/// a same-named type, returns the winning definition.
pub type OnTypeConflict = Arc<dyn Fn(&ExtendedType, &ExtendedType) -> ExtendedType + Send + Sync>;

/// The default conflict resolver always favours the incoming type over the
/// incumbent, at type granularity rather than field granularity.
pub fn last_writer_wins() -> OnTypeConflict {
    Arc::new(|_incumbent, incoming| incoming.clone())
}

/// Definitions injected into every composed schema so that sources may
/// annotate fields (or whole types) with cache hints.
const CACHE_CONTROL_DEFINITIONS: &str = r#"
directive @cacheControl(maxAge: Int, scope: CacheControlScope) on FIELD_DEFINITION | OBJECT | INTERFACE
enum CacheControlScope {
    PUBLIC
    PRIVATE
}
"#;

/// The single schema produced by folding sources together. Stays mergeable
/// until the gateway finalizes its routes, after which it is validated and
/// immutable for the life of the process.
pub struct ComposedSchema {
    schema: Schema,
    resolvers: ResolverMap,
}

impl ComposedSchema {
    /// Merges `sources` into `existing` (existing-first, then sources in
    /// registration order, a single pass).
    ///
    /// Fails with [`SchemaError::NoSchema`] when there is nothing to merge
    /// at all; the caller must treat that as fatal at startup.
    pub fn merge(
        existing: Option<ComposedSchema>,
        sources: Vec<SchemaSource>,
        on_conflict: Option<OnTypeConflict>,
    ) -> Result<ComposedSchema, SchemaError> {
        if existing.is_none() && sources.is_empty() {
            return Err(SchemaError::NoSchema);
        }
        let on_conflict = on_conflict.unwrap_or_else(last_writer_wins);

        let mut merged = existing.map(|composed| (composed.schema, composed.resolvers));
        for source in sources {
            let incoming = Schema::parse(&source.type_defs, "schema.graphql")
                .map_err(|errors| SchemaError::Parse(errors.to_string()))?;
            merged = Some(match merged {
                None => (incoming, source.resolvers),
                Some((mut base, mut resolvers)) => {
                    merge_schema(&mut base, &incoming, &on_conflict);
                    resolvers.merge(source.resolvers);
                    (base, resolvers)
                }
            });
        }

        let (schema, resolvers) = merged.expect("at least one source was merged; qed");
        Ok(ComposedSchema { schema, resolvers })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    /// Validates the merged schema and freezes it. There is no
    /// remerge-after-finalize path within one gateway instance.
    pub(crate) fn finalize(mut self) -> Result<(Valid<Schema>, ResolverMap), SchemaError> {
        inject_cache_control_definitions(&mut self.schema);
        let valid = self
            .schema
            .validate()
            .map_err(|errors| SchemaError::Validation(errors.to_string()))?;
        Ok((valid, self.resolvers))
    }
}

/// Structural merge of `incoming` into `base`: type map first, then
/// directive definitions and explicit root-operation bindings.
fn merge_schema(base: &mut Schema, incoming: &Schema, on_conflict: &OnTypeConflict) {
    for (name, incoming_type) in &incoming.types {
        if incoming_type.is_built_in() {
            continue;
        }
        let winner = match base.types.get(name) {
            Some(incumbent) => on_conflict(incumbent, incoming_type),
            None => incoming_type.clone(),
        };
        base.types.insert(name.clone(), winner);
    }

    for (name, definition) in &incoming.directive_definitions {
        if !is_built_in_directive(name.as_str()) {
            base.directive_definitions
                .insert(name.clone(), definition.clone());
        }
    }

    let base_definition = base.schema_definition.make_mut();
    if let Some(query) = &incoming.schema_definition.query {
        base_definition.query = Some(query.clone());
    }
    if let Some(mutation) = &incoming.schema_definition.mutation {
        base_definition.mutation = Some(mutation.clone());
    }
    if let Some(subscription) = &incoming.schema_definition.subscription {
        base_definition.subscription = Some(subscription.clone());
    }
}

fn is_built_in_directive(name: &str) -> bool {
    matches!(name, "skip" | "include" | "deprecated" | "specifiedBy")
}

fn inject_cache_control_definitions(schema: &mut Schema) {
    let definitions = Schema::parse(CACHE_CONTROL_DEFINITIONS, "cache_control.graphql")
        .expect("built-in cache control definitions parse; qed");
    for (name, definition) in &definitions.directive_definitions {
        if !is_built_in_directive(name.as_str()) {
            schema
                .directive_definitions
                .entry(name.clone())
                .or_insert_with(|| definition.clone());
        }
    }
    for (name, ty) in &definitions.types {
        if !ty.is_built_in() {
            schema
                .types
                .entry(name.clone())
                .or_insert_with(|| ty.clone());
        }
    }
}

/// The name of the root operation type for `kind`, if the composed schema
/// defines one.
pub fn root_operation(schema: &Schema, kind: OperationKind) -> Option<&str> {
    let operation_type = match kind {
        OperationKind::Query => ast::OperationType::Query,
        OperationKind::Mutation => ast::OperationType::Mutation,
        OperationKind::Subscription => ast::OperationType::Subscription,
    };
    schema
        .root_operation(operation_type)
        .map(|name| name.as_str())
}

/// Derives the cache hint for a field from its `@cacheControl` directive,
/// falling back to a directive on the field's declaring type. Absent a
/// `maxAge` argument there is no hint and the field is never cached.
pub fn field_cache_hint(schema: &Schema, parent_type: &str, field_name: &str) -> Option<CacheHint> {
    let field = schema.type_field(parent_type, field_name).ok()?;
    let directive = field
        .directives
        .get_all("cacheControl")
        .next()
        .map(|directive| &**directive)
        .or_else(|| {
            schema
                .types
                .get(parent_type)?
                .directives()
                .get_all("cacheControl")
                .next()
                .map(|directive| &***directive)
        })?;

    let max_age = directive
        .specified_argument_by_name("maxAge")
        .and_then(|value| value.to_i32())
        .filter(|max_age| *max_age >= 0)? as u64;

    let scope = directive
        .specified_argument_by_name("scope")
        .and_then(|value| value.as_enum())
        .map(|name| {
            if name.as_str() == "PRIVATE" {
                CacheScope::Private
            } else {
                CacheScope::Public
            }
        })
        .unwrap_or(CacheScope::Public);

    Some(CacheHint { max_age, scope })
}
