//! The per-field resolution request handed to the interception stack by the
//! execution engine.

use crate::context::RequestContext;
use crate::json::{Object, Value};
use apollo_compiler::ast;
use serde::{Deserialize, Serialize};
use std::fmt;
use typed_builder::TypedBuilder;

/// The root operation kind a field access occurs under; the action side of
/// an access check.
///
/// Constant for every field within one operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ast::OperationType> for OperationKind {
    fn from(operation_type: ast::OperationType) -> Self {
        match operation_type {
            ast::OperationType::Query => OperationKind::Query,
            ast::OperationType::Mutation => OperationKind::Mutation,
            ast::OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

/// Whether a cached value may be shared across principals.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheScope {
    Public,
    Private,
}

/// Per-field cache metadata derived from the schema's `@cacheControl`
/// directive. A field without a max-age hint is never cached.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheHint {
    /// Entry lifetime in seconds.
    pub max_age: u64,
    pub scope: CacheScope,
}

/// What the execution engine tells us about the field being resolved.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct FieldMetadata {
    /// Name of the type declaring the field.
    pub parent_type: String,
    pub field_name: String,
    #[builder(default = OperationKind::Query)]
    pub operation_kind: OperationKind,
    #[builder(default)]
    pub cache_hint: Option<CacheHint>,
}

impl FieldMetadata {
    /// The resource identifier this field access is authorized as.
    ///
    /// Always the fully qualified `Type::field` form; wildcard expansion is
    /// the policy engine's business.
    pub fn resource(&self) -> String {
        format!("{}::{}", self.parent_type, self.field_name)
    }
}

/// One field resolution request flowing through the interception stack.
#[derive(Clone, TypedBuilder)]
pub struct FieldRequest {
    /// The already-resolved parent value, `root` in condition paths.
    #[builder(default = Value::Null)]
    pub parent: Value,
    /// The field arguments, `args` in condition paths.
    #[builder(default)]
    pub args: Object,
    pub context: RequestContext,
    pub metadata: FieldMetadata,
}
