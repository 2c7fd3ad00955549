//! JSON value manipulation utilities.
//!
//! The gateway carries resolved field data as [`serde_json_bytes::Value`],
//! which keeps string data as shared byte buffers so values can be cloned
//! in and out of the response cache cheaply.

use apollo_compiler::ast;
use serde_json_bytes::ByteString;

pub type Value = serde_json_bytes::Value;
pub type Object = serde_json_bytes::Map<ByteString, Value>;

/// Dotted-path lookup over JSON values, used to resolve policy-condition
/// paths such as `user.id` or `root.authorId`.
pub trait ValueExt {
    /// Returns the value at `path`, where `path` is a `.`-separated chain
    /// of object keys and array indices.
    fn get_path(&self, path: &str) -> Option<&Value>;
}

impl ValueExt for Value {
    fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Value::Object(object) => object.get(segment)?,
                Value::Array(array) => array.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Converts a GraphQL AST value (a literal argument or directive argument)
/// into a JSON value. Variables have no JSON counterpart and map to `Null`.
pub fn ast_to_value(value: &ast::Value) -> Value {
    match value {
        ast::Value::Null | ast::Value::Variable(_) => Value::Null,
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::Enum(name) => Value::String(name.as_str().into()),
        ast::Value::String(s) => Value::String(s.as_str().into()),
        ast::Value::Int(i) => i
            .try_to_i32()
            .map(|i| Value::Number(i.into()))
            .unwrap_or(Value::Null),
        ast::Value::Float(f) => f
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ast::Value::List(items) => {
            Value::Array(items.iter().map(|item| ast_to_value(item)).collect())
        }
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (ByteString::from(name.as_str()), ast_to_value(value)))
                .collect(),
        ),
    }
}
