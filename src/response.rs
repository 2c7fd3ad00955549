//! The standard GraphQL JSON envelope.

use crate::error::Error;
use crate::json::{Object, Value};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// A GraphQL response: partial data plus the field errors collected along
/// the way. Authorization denials ride in `errors` with `null` data at the
/// denied field; they never make the transport return a non-200 status.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[builder(default = Value::Null)]
    pub data: Value,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    #[builder(default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    #[builder(default)]
    pub extensions: Object,
}
