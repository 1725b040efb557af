//! filedrop API library
//!
//! This crate provides the HTTP handlers, middleware, and application setup for the
//! upload service.

// Module declarations
mod handlers;
mod middleware;
mod telemetry;

// Public modules
pub mod auth;
pub mod constants;
pub mod error;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
