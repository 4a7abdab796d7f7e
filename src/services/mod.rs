//! Business logic services

pub mod audit;
pub mod audit_writer;
pub mod auth;
pub mod email;
pub mod geolocation;
pub mod ip_resolver;
pub mod user_admin;
pub mod user_agent;

pub use audit::{ActionRecord, AuditLogger, LoginAttempt};
pub use audit_writer::{AuditWriter, WriteOutcome};
pub use auth::{AuthOutcome, AuthService};
pub use email::{build_mailer, DisabledMailer, Email, Mailer, SmtpMailer};
pub use geolocation::GeoLocator;
pub use user_admin::UserAdminService;
