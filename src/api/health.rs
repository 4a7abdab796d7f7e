//! Health check endpoints
//!
//! The detailed check also records a sample to `system_health_metrics` and
//! `system_uptime_log`; failures to record are logged and ignored.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::db::{self, MonitoringRepository};
use crate::models::HealthMetric;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub success: bool,
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    pub audit_tables: ComponentStatus,
    pub geolocation: ComponentStatus,
    pub email: ComponentStatus,
}

#[derive(Serialize)]
pub struct ComponentStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            message: None,
        }
    }

    fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: Some(message.into()),
        }
    }

    fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            message: Some(message.into()),
        }
    }

    fn enabled(enabled: bool) -> Self {
        Self {
            status: if enabled { "enabled" } else { "disabled" }.to_string(),
            message: None,
        }
    }
}

/// Returns 200 OK if the process is serving requests
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Checks the database and audit tables. 200 when the database is reachable,
/// 503 otherwise; missing audit tables only degrade the status.
pub async fn health_check_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<DetailedHealthResponse>) {
    let started = Instant::now();
    let database = match db::check_health(&state.db).await {
        Ok(_) => ComponentStatus::healthy(),
        Err(e) => ComponentStatus::unhealthy(e.to_string()),
    };
    let db_latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    let database_ok = database.status == "healthy";

    let audit_tables = if database_ok {
        let missing = db::missing_tables(&state.db).await;
        if missing.is_empty() {
            ComponentStatus::healthy()
        } else {
            ComponentStatus::degraded(format!("Missing tables: {}", missing.join(", ")))
        }
    } else {
        ComponentStatus::unhealthy("Database unavailable")
    };

    let status = if !database_ok {
        "unhealthy"
    } else if audit_tables.status != "healthy" {
        "degraded"
    } else {
        "healthy"
    };
    let uptime_seconds = state.started_at.elapsed().as_secs();

    if database_ok {
        let repo = MonitoringRepository::new(&state.db);
        let metric = HealthMetric {
            metric_name: "database".to_string(),
            status: database.status.clone(),
            value: Some(db_latency_ms),
            message: audit_tables.message.clone(),
        };
        if let Err(e) = repo.record_health_metric(&metric).await {
            warn!("Failed to record health metric: {}", e);
        }
        if let Err(e) = repo
            .record_uptime(status, uptime_seconds, env!("CARGO_PKG_VERSION"))
            .await
        {
            warn!("Failed to record uptime sample: {}", e);
        }
    }

    let status_code = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = DetailedHealthResponse {
        success: database_ok,
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        components: ComponentHealth {
            database,
            audit_tables,
            geolocation: ComponentStatus::enabled(state.config.audit.geolocation.enabled),
            email: ComponentStatus::enabled(state.config.email.enabled),
        },
    };

    (status_code, Json(response))
}

/// Liveness probe
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
