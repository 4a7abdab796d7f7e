//! Middleware components
//!
//! - Authentication (JWT)
//! - Request context extraction for audit logging
//! - Login rate limiting
//! - Security headers

pub mod auth;
pub mod rate_limit;
pub mod request_context;
pub mod security_headers;

pub use auth::{auth_middleware, AuthUser, Claims};
pub use rate_limit::{login_rate_limit_middleware, spawn_rate_limit_cleanup, LoginRateLimiter};
pub use security_headers::security_headers_middleware;
