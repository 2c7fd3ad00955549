//! Request-scoped context threaded through every field resolution.
//!
//! The context is an explicit value type rather than a loosely-typed bag: it
//! carries the authenticated [`Principal`] plus an immutable named-value
//! registry populated once while the gateway is built and frozen before any
//! request is served.

use crate::json::{Object, Value, ValueExt};
use crate::schema::Backend;
use serde::{Deserialize, Serialize};
use serde_json_bytes::json;
use std::collections::HashMap;
use std::sync::Arc;

/// The authenticated (or anonymous) identity attached to a request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// `None` for the anonymous principal.
    pub id: Option<String>,
    /// Opaque role tags matched against policy role lists.
    pub roles: Vec<String>,
}

impl Principal {
    pub const ANONYMOUS_ROLE: &'static str = "anonymous";

    /// The default principal before any authentication provider runs.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            roles: vec![Self::ANONYMOUS_ROLE.to_string()],
        }
    }

    pub fn new(id: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: Some(id.into()),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Named values shared by every request: plain JSON configuration values and
/// downstream [`Backend`]s that forwarding resolvers delegate to.
///
/// Built once through [`crate::Gateway::builder`] and never mutated after the
/// gateway starts serving.
#[derive(Default)]
pub struct ContextRegistry {
    values: HashMap<String, Value>,
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl ContextRegistry {
    pub(crate) fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub(crate) fn insert_backend(&mut self, key: impl Into<String>, backend: Arc<dyn Backend>) {
        self.backends.insert(key.into(), backend);
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn backend(&self, key: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(key).cloned()
    }
}

/// The shared per-request context.
///
/// Cloning is cheap: the registry is behind an `Arc` and the principal is a
/// small value.
#[derive(Clone)]
pub struct RequestContext {
    pub principal: Principal,
    registry: Arc<ContextRegistry>,
}

impl RequestContext {
    pub fn new(registry: Arc<ContextRegistry>) -> Self {
        Self {
            principal: Principal::anonymous(),
            registry,
        }
    }

    pub fn with_principal(registry: Arc<ContextRegistry>, principal: Principal) -> Self {
        Self {
            principal,
            registry,
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.registry.value(key)
    }

    pub fn backend(&self, key: &str) -> Option<Arc<dyn Backend>> {
        self.registry.backend(key)
    }
}

/// The view of a request handed to the authorization decision: the request
/// context extended with the current parent value (`root`) and the field
/// arguments (`args`), so policy conditions can express ownership checks
/// such as `user.id == root.authorId`.
pub struct EvalContext {
    context: RequestContext,
    root: Value,
    args: Object,
}

impl EvalContext {
    pub fn new(context: RequestContext, root: Value, args: Object) -> Self {
        Self {
            context,
            root,
            args,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.context.principal
    }

    /// Resolves a dotted path against the evaluation context.
    ///
    /// `user` (or `principal`) addresses the principal, `root` the parent
    /// value, `args` the field arguments; any other head is looked up in the
    /// frozen registry values.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match head {
            "user" | "principal" => {
                let principal = json!({
                    "id": self.context.principal.id.clone(),
                    "roles": self.context.principal.roles.clone(),
                });
                match rest {
                    Some(rest) => principal.get_path(rest).cloned(),
                    None => Some(principal),
                }
            }
            "root" => match rest {
                Some(rest) => self.root.get_path(rest).cloned(),
                None => Some(self.root.clone()),
            },
            "args" => {
                let args = Value::Object(self.args.clone());
                match rest {
                    Some(rest) => args.get_path(rest).cloned(),
                    None => Some(args),
                }
            }
            key => {
                let value = self.context.value(key)?;
                match rest {
                    Some(rest) => value.get_path(rest).cloned(),
                    None => Some(value.clone()),
                }
            }
        }
    }
}
