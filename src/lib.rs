//! A GraphQL gateway core that composes schemas from multiple sources and
//! transparently enforces field-level access control and response caching,
//! without the underlying resolvers knowing about authorization.
//!
//! The execution engine, HTTP transport and policy-matching algorithm are
//! external collaborators: the engine drives [`Gateway::resolve_field`] for
//! every field of a query and converts a denial into a GraphQL field error
//! with standard null propagation, the transport feeds
//! [`Gateway::begin_request`], and policy decisions come from whatever sits
//! behind the [`PolicyEngine`] trait.

mod cache;
mod context;
mod error;
mod gateway;
mod json;
mod layers;
mod policy;
mod request;
mod response;
mod schema;
mod services;

pub use cache::*;
pub use context::*;
pub use error::*;
pub use gateway::*;
pub use json::*;
pub use layers::*;
pub use policy::*;
pub use request::*;
pub use response::*;
pub use schema::*;
pub use services::*;
