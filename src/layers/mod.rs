pub mod authorization;
pub mod caching;

pub use authorization::AuthorizationLayer;
pub use caching::CachingLayer;
