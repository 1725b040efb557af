//! Caller authorization
//!
//! The upload pipeline only consumes a yes/no decision and an identity. Deciding is
//! delegated to an [`Authorizer`]; the shipped implementation checks static API keys.

pub mod api_key;
pub mod middleware;
pub mod models;

pub use api_key::ApiKeyAuthorizer;
pub use middleware::auth_middleware;
pub use models::{AccessDecision, Authorizer, CallerIdentity};
