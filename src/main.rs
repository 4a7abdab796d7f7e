//! LMS Admin - administration backend for the learning management system
//!
//! Serves the user lifecycle API and records audit, login and activity logs.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config::LogFormat;
use lms_admin::{
    api, config, db,
    db::user_repository,
    middleware,
    models::{User, UserRole},
    services::{self, AuditLogger, AuthService, GeoLocator},
    utils::validation::{validate_email, validate_password, validate_username},
    AppConfig, AppState,
};

/// Environment variable holding the password for `--create-admin`
const INITIAL_PASSWORD_ENV: &str = "LMS_ADMIN_INITIAL_PASSWORD";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("LMS Admin {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(args, config))
}

async fn run(args: Vec<String>, config: AppConfig) -> Result<()> {
    // The guard must outlive the server so file logs are flushed
    let _log_guard = init_logging(&config);

    if args.iter().any(|arg| arg == "--fix-database") {
        return fix_database(&config).await;
    }

    if args.iter().any(|arg| arg == "--purge-audit-logs") {
        return purge_audit_logs(&config).await;
    }

    if let Some(pos) = args.iter().position(|arg| arg == "--create-admin") {
        let username = args.get(pos + 1).context("--create-admin requires USERNAME EMAIL")?;
        let email = args.get(pos + 2).context("--create-admin requires USERNAME EMAIL")?;
        return create_admin(&config, username, email).await;
    }

    info!("LMS Admin {} starting up", env!("CARGO_PKG_VERSION"));

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    let missing = db::missing_tables(&db).await;
    if !missing.is_empty() {
        warn!(
            "Missing tables after migrations: {}; audit writes will fall back",
            missing.join(", ")
        );
    }

    if config.email.enabled {
        info!("Email notifications via {}:{}", config.email.smtp_host, config.email.smtp_port);
    } else {
        info!("Email notifications disabled");
    }
    let mailer = services::build_mailer(&config.email).context("Failed to initialize mailer")?;

    if config.audit.geolocation.enabled {
        info!("IP geolocation enabled: {}", config.audit.geolocation.api_url);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    let state = AppState::new(config, db, mailer).context("Failed to build application state")?;
    middleware::spawn_rate_limit_cleanup(state.login_limiter.clone());

    let app = api::build_router(state);

    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server is ready to accept connections");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;

    match &log_config.target {
        LogTarget::Console => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_both_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(fmt::layer().with_target(true).with_thread_ids(false))
                .init();
        }
    }
}

fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(writer))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false).with_writer(writer))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
        }
    }
}

/// Console and file at once; the file copy never carries ANSI colors
fn init_both_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .with(fmt::layer().json().with_target(true).with_writer(writer))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false))
                .with(fmt::layer().compact().with_target(false).with_writer(writer))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(fmt::layer().with_target(true))
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
        }
    }
}

/// Create the parent directory of a `sqlite://` database file
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"LMS Admin {}

USAGE:
    lms-admin [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --fix-database          Run all migrations and verify that every required
                            table exists, then exit.
    --purge-audit-logs      Delete audit, login and activity log rows older
                            than audit.retention_days, then exit.
    --create-admin USERNAME EMAIL
                            Create an administrator account and exit. The
                            password is read from {}.

ENVIRONMENT:
    LMS_ADMIN_CONFIG        Path to configuration file
    LMS_ADMIN_HOST          Listen address
    LMS_ADMIN_PORT          Listen port
    LMS_ADMIN_LOG_FORMAT    pretty, json or compact
    DATABASE_URL            SQLite database URL
    JWT_SECRET              Token signing secret (at least 32 characters)
    RUST_LOG                Log filter
    AUDIT_RETENTION_DAYS    Days to keep log rows
    SMTP_HOST               SMTP relay; setting it enables email
    SMTP_USERNAME           SMTP user
    SMTP_PASSWORD           SMTP password

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by LMS_ADMIN_CONFIG
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/lms-admin/config.yaml
    5. <user config dir>/lms-admin/config.yaml"#,
        env!("CARGO_PKG_VERSION"),
        INITIAL_PASSWORD_ENV,
    );
}

/// Run migrations, then report any required table that is still missing
async fn fix_database(config: &AppConfig) -> Result<()> {
    println!("LMS Admin Database Repair Tool v{}", env!("CARGO_PKG_VERSION"));
    println!();

    ensure_data_directory(config)?;

    println!("Database URL: {}", config.database.url);
    println!("Connecting to database...");
    let pool = db::connect(&config.database).await?;

    println!("Running database migrations...");
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        eprintln!("Migration error: {}", e);
        return Err(e).context("Failed to run database migrations");
    }
    println!("Migrations completed successfully.");
    println!();

    let missing = db::missing_tables(&pool).await;
    if missing.is_empty() {
        println!("All {} required tables are present.", db::REQUIRED_TABLES.len());
        Ok(())
    } else {
        eprintln!("WARNING: {} missing table(s) after migrations:", missing.len());
        for table in &missing {
            eprintln!("  - {}", table);
        }
        Err(anyhow::anyhow!(
            "Database repair incomplete: {} missing tables",
            missing.len()
        ))
    }
}

/// One-shot retention cleanup using the configured retention period
async fn purge_audit_logs(config: &AppConfig) -> Result<()> {
    let pool = db::connect(&config.database).await?;

    let audit = AuditLogger::new(pool, std::sync::Arc::new(GeoLocator::disabled()));
    let report = audit.cleanup(config.audit.retention_days).await;

    println!(
        "Purged log rows older than {} days (before {}):",
        report.retention_days, report.cutoff
    );
    for (table, deleted) in &report.deleted {
        println!("  {:<28} {}", table, deleted);
    }
    println!("Total: {}", report.total());

    Ok(())
}

/// Insert an active admin account
async fn create_admin(config: &AppConfig, username: &str, email: &str) -> Result<()> {
    let password = env::var(INITIAL_PASSWORD_ENV)
        .with_context(|| format!("{} must be set", INITIAL_PASSWORD_ENV))?;

    if !validate_username(username) {
        anyhow::bail!("Invalid username: {}", username);
    }
    if !validate_email(email) {
        anyhow::bail!("Invalid email address: {}", email);
    }
    if !validate_password(&password, config.auth.password_min_length) {
        anyhow::bail!(
            "Password must be at least {} characters and mix letters and digits",
            config.auth.password_min_length
        );
    }

    ensure_data_directory(config)?;
    let pool = db::init_pool(&config.database).await?;

    let user = User::new(
        username.to_string(),
        email.to_lowercase(),
        username.to_string(),
        AuthService::hash_password(&password)?,
        UserRole::Admin,
    );
    user_repository::insert(&pool, &user)
        .await
        .context("Failed to create admin account")?;

    println!("Created admin account {} ({})", user.username, user.id);
    Ok(())
}
