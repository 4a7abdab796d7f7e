//! Integration tests for LMS Admin
//!
//! These tests drive the full router with a temporary SQLite database and a
//! recording mailer.

mod api_tests;
mod audit_tests;
mod auth_tests;
mod user_lifecycle_tests;
