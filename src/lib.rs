//! Rusty Warden - session token authentication and path-based authorization
//!
//! This library issues opaque session tokens bound to roles, expires them
//! lazily after an idle timeout, and decides per request path which roles
//! are required, consulting pluggable identity backends.

pub mod auth;
pub mod config;
pub mod constants;
pub mod constraint;
pub mod error;
pub mod handlers;
pub mod service;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
pub use error::{Result, WardenError};
pub use service::{AccessDecision, AuthService, SharedAuthService};
