//! The policy-decision boundary.
//!
//! The gateway consumes an allow/deny decision per field access; the
//! pattern-matching algorithm itself (glob expansion over resource patterns,
//! role and condition matching, precedence between overlapping policies)
//! lives in the external engine behind [`PolicyEngine`]. The types here are
//! the shapes that engine consumes.

use crate::context::EvalContext;
use crate::error::AuthorizeError;
use crate::request::OperationKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::BoxError;

/// The effect of a matching policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PolicyEffect {
    Allow,
    Deny,
}

/// A condition comparing a dotted path on the evaluation context against one
/// or more other paths, enabling ownership checks such as
/// `user.id match [root.authorId]`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCondition {
    /// Path to the value under test, e.g. `user.id`.
    pub field: String,
    pub operator: ConditionOperator,
    /// Paths resolved from the live evaluation context, e.g. `root.id`,
    /// `args.id`.
    pub expected_on_context: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Match,
    NotMatch,
}

/// A declarative access rule. `resources` may carry wildcards
/// (`User::*`, `Query::*`); `actions` and `roles` may contain `"*"`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub resources: Vec<String>,
    pub actions: Vec<String>,
    pub effect: PolicyEffect,
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PolicyCondition>,
}

/// One access check: the action and fully qualified resource of the field
/// being resolved, plus the evaluation context conditions run against.
pub struct AccessRequest<'a> {
    pub action: OperationKind,
    pub resource: &'a str,
    pub context: &'a EvalContext,
}

/// The external policy-decision function.
///
/// Implementations are constructed once from an ordered list of [`Policy`]
/// records and must tolerate concurrent use from any number of in-flight
/// field resolutions.
pub trait PolicyEngine: Send + Sync {
    /// Returns whether the access is allowed. An error is never treated as
    /// an allow by the caller.
    fn evaluate_access(&self, request: &AccessRequest<'_>) -> Result<bool, BoxError>;
}

/// The authorization decision seam. Chosen once at gateway construction and
/// never mutated afterwards.
pub type AuthorizeFn =
    Arc<dyn Fn(&AccessRequest<'_>) -> Result<bool, AuthorizeError> + Send + Sync>;

/// The default decision: delegate to the configured engine, or fail closed
/// the first time any field is resolved without one.
pub(crate) fn default_authorize(engine: Option<Arc<dyn PolicyEngine>>) -> AuthorizeFn {
    Arc::new(move |request| match &engine {
        Some(engine) => Ok(engine.evaluate_access(request)?),
        None => Err(AuthorizeError::Unconfigured),
    })
}
