//! Database layer
//!
//! SQLite storage for:
//! - User accounts
//! - The audit trail and its legacy tables
//! - Login and activity logs
//! - Site monitoring samples

pub mod activity_repository;
pub mod audit_repository;
pub mod login_log_repository;
pub mod monitoring_repository;
pub mod user_repository;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite, SqliteExecutor};

use crate::config::DatabaseConfig;

pub use activity_repository::ActivityRepository;
pub use audit_repository::{AuditRepository, AuditTable};
pub use login_log_repository::LoginLogRepository;
pub use monitoring_repository::MonitoringRepository;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Tables the application expects after migrations
pub const REQUIRED_TABLES: &[&str] = &[
    "users",
    "comprehensive_audit_trail",
    "admin_audit_log",
    "audit_trail",
    "login_logs",
    "user_activity_log",
    "broken_links",
    "system_uptime_log",
    "system_health_metrics",
];

/// Initialize the connection pool and run migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = connect(config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Open a pool without running migrations
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .context("Failed to parse database URL")?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.connect_timeout_secs))
        .foreign_keys(true)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(options)
        .await
        .context("Failed to connect to database")
}

/// Check database connectivity
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}

/// Probe whether `table` exists with a trial SELECT
///
/// `table` must be a trusted identifier; it is interpolated into the SQL.
pub async fn table_exists<'e, E>(executor: E, table: &str) -> bool
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(&format!("SELECT 1 FROM {} LIMIT 1", table))
        .fetch_optional(executor)
        .await
        .is_ok()
}

/// Names of required tables that are missing
pub async fn missing_tables(pool: &DbPool) -> Vec<&'static str> {
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        if !table_exists(pool, table).await {
            missing.push(*table);
        }
    }
    missing
}

/// Timestamps are stored as RFC 3339 UTC with second precision so that
/// lexical order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_db_timestamp(ts: &str) -> DateTime<Utc> {
    parse_optional_timestamp(Some(ts)).unwrap_or_else(Utc::now)
}

pub fn parse_optional_timestamp(ts: Option<&str>) -> Option<DateTime<Utc>> {
    let ts = ts?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    None
}
