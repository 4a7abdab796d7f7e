//! Common test utilities and helpers
//!
//! Test application harness, recording mailer and request helpers.

pub mod test_app;

pub use test_app::*;
