//! LMS Admin Library
//!
//! Admin backend for a learning management system: account lifecycle
//! management with audit, login and activity logging.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims};

use middleware::LoginRateLimiter;
use services::{AuditLogger, GeoLocator, Mailer, UserAdminService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub audit: AuditLogger,
    pub mailer: Arc<dyn Mailer>,
    pub login_limiter: LoginRateLimiter,
    pub started_at: Instant,
}

impl AppState {
    /// Build state with the geolocator described by `config`
    pub fn new(config: AppConfig, db: DbPool, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let geo = GeoLocator::new(&config.audit.geolocation)?;
        Ok(Self::with_geolocator(config, db, mailer, geo))
    }

    pub fn with_geolocator(
        config: AppConfig,
        db: DbPool,
        mailer: Arc<dyn Mailer>,
        geo: GeoLocator,
    ) -> Self {
        Self {
            audit: AuditLogger::new(db.clone(), Arc::new(geo)),
            login_limiter: LoginRateLimiter::per_minute(config.auth.login_attempts_per_minute),
            started_at: Instant::now(),
            config,
            db,
            mailer,
        }
    }

    pub fn user_admin(&self) -> UserAdminService {
        UserAdminService::new(
            self.db.clone(),
            self.audit.clone(),
            self.mailer.clone(),
            self.config.server.public_url.clone(),
            self.config.auth.password_min_length,
        )
    }
}
