//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Throttle clients
//! - Short-circuit requests (reject unauthorized or over-quota callers)

/// API key authentication middleware
pub mod auth;
/// Fixed-window rate limiting
pub mod rate_limit;
