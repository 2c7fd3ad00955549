//! Error taxonomy for the gateway.
//!
//! Field-level failures are converted to JSON for the wire [`struct@Error`]
//! and never abort sibling fields; startup failures ([`SchemaError`]) are
//! fatal and must prevent the server from accepting requests.

use crate::json::{Object, Value};
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use serde_json_bytes::json;
use thiserror::Error;
use tower::BoxError;

/// A GraphQL error as it appears in the wire response.
#[derive(Error, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error from the originating request.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locations: Vec<Location>,

    /// The path of the field that produced the error.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<Value>,

    /// The optional graphql extensions.
    #[serde(default, skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

/// A location in the request that triggered a graphql error.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The line number.
    pub line: i32,

    /// The column number.
    pub column: i32,
}

/// An access-control denial for a single field resolution.
///
/// Whatever the cause (role mismatch, explicit deny, engine failure), the
/// wire-visible message is always the uniform `Access Denied` so clients
/// cannot learn which rule blocked them. The machine-readable `deny_type`
/// goes into the error extensions.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[error("{reason}")]
pub struct AuthorizationError {
    /// A deny-reason code, `access-denied` unless the decision supplied one.
    pub deny_type: String,
    /// Internal reason, for logs only.
    pub reason: String,
}

impl AuthorizationError {
    pub const DEFAULT_DENY_TYPE: &'static str = "access-denied";
    pub const PUBLIC_MESSAGE: &'static str = "Access Denied";

    pub fn new(deny_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            deny_type: deny_type.into(),
            reason: reason.into(),
        }
    }
}

impl Default for AuthorizationError {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DENY_TYPE, Self::PUBLIC_MESSAGE)
    }
}

/// Error types for a single field resolution.
///
/// Note that these are not returned to the client directly, but are instead
/// converted to JSON for [`struct@Error`].
#[derive(Error, Display, Debug, Clone)]
pub enum FieldError {
    /// access denied
    Authorization(#[from] AuthorizationError),

    /// resolver failed: {reason}
    Resolver {
        /// The reason the resolver failed.
        reason: String,
    },

    /// no field '{resource}' in the composed schema
    UnknownField {
        /// The resource identifier that was requested.
        resource: String,
    },

    /// no backend registered in the context under key '{key}'
    MissingBackend {
        /// The context key the forwarding resolver expected.
        key: String,
    },

    /// authorization requested but no policy engine was configured
    PolicyEngineUnconfigured,
}

impl FieldError {
    /// Convert the field error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Value>) -> Error {
        let (message, code) = match self {
            FieldError::Authorization(denial) => (
                AuthorizationError::PUBLIC_MESSAGE.to_string(),
                denial.deny_type.clone(),
            ),
            FieldError::Resolver { .. } => (self.to_string(), "RESOLVER_ERROR".to_string()),
            FieldError::UnknownField { .. } => (self.to_string(), "UNKNOWN_FIELD".to_string()),
            FieldError::MissingBackend { .. } => (self.to_string(), "MISSING_BACKEND".to_string()),
            FieldError::PolicyEngineUnconfigured => {
                (self.to_string(), "POLICY_ENGINE_UNCONFIGURED".to_string())
            }
        };
        let mut extensions = Object::new();
        extensions.insert("code", json!(code));
        Error {
            message,
            locations: Vec::new(),
            path,
            extensions,
        }
    }
}

/// Error produced by the authorization decision seam.
#[derive(Error, Display, Debug)]
pub enum AuthorizeError {
    /// no policy engine was configured
    Unconfigured,

    /// policy engine failed: {0}
    Engine(#[from] BoxError),
}

/// Error in the schema composition step. Fatal at startup.
#[derive(Error, Display, Debug)]
pub enum SchemaError {
    /// cannot start: no schema has been registered
    NoSchema,

    /// schema parse error(s): {0}
    Parse(String),

    /// composed schema failed validation: {0}
    Validation(String),
}

/// A response-cache read or write failure.
///
/// Always recovered locally and treated as a cache miss, so a broken cache
/// degrades to recomputation rather than denial or corruption.
#[derive(Error, Debug, Clone)]
#[error("cache access failed: {reason}")]
pub struct CacheError {
    /// The reason the backend failed.
    pub reason: String,
}

impl CacheError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An authentication-provider failure.
///
/// Recovered by falling back to the anonymous principal, so authorization
/// uniformly decides access rather than the request hard-failing.
#[derive(Error, Debug)]
#[error("authentication failed: {reason}")]
pub struct AuthenticationError {
    /// The reason the provider failed.
    pub reason: String,
}

impl AuthenticationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
