//! Audit log API endpoints

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    db::{AuditRepository, LoginLogRepository},
    middleware::AuthUser,
    models::{
        ApiResponse, AuditAction, AuditEntry, AuditLogQuery, CleanupReport, LoginLogEntry,
        LoginLogQuery, RequestContext,
    },
    services::ActionRecord,
    utils::{validation::csv_escape, AppError, AppResult},
    AppState,
};

/// Upper bound on rows in a single CSV export
const EXPORT_LIMIT: u32 = 10_000;

const CSV_HEADER: &str = "id,created_at,username,user_role,action_type,action_description,\
resource_type,resource_id,resource_name,outcome,ip_address,browser,os,device_type,city,country,\
session_id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/export", get(export_audit_logs))
        .route("/logins", get(list_login_logs))
        .route("/cleanup", post(cleanup_logs))
}

#[derive(Debug, Deserialize, Default)]
pub struct CleanupRequest {
    /// Overrides `audit.retention_days`
    pub retention_days: Option<u32>,
}

/// Admins see everything; teaching roles only their own actions
fn scope_query(auth_user: &AuthUser, mut query: AuditLogQuery) -> AppResult<AuditLogQuery> {
    if auth_user.is_admin() {
        return Ok(query);
    }
    if !auth_user.role.can_teach() {
        return Err(AppError::forbidden("Not allowed to view audit logs"));
    }
    query.user_id = Some(auth_user.id);
    Ok(query)
}

/// GET /api/v1/audit-logs
async fn list_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<ApiResponse<Vec<AuditEntry>>> {
    let query = scope_query(&auth_user, query)?;

    let entries = AuditRepository::new(&state.db).list(&query).await.map_err(|e| {
        tracing::error!("Failed to list audit logs: {}", e);
        AppError::internal("Failed to list audit logs")
    })?;

    Ok(ApiResponse::data(entries))
}

/// GET /api/v1/audit-logs/export
///
/// Same filters as the listing, rendered as CSV.
async fn export_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Query(mut query): Query<AuditLogQuery>,
) -> AppResult<Response> {
    auth_user.require_admin()?;

    query.limit = Some(query.limit.unwrap_or(EXPORT_LIMIT).min(EXPORT_LIMIT));
    query.offset = None;

    let entries = AuditRepository::new(&state.db).list(&query).await.map_err(|e| {
        tracing::error!("Failed to export audit logs: {}", e);
        AppError::internal("Failed to export audit logs")
    })?;

    let body = render_csv(&entries);
    let record = ActionRecord::new(AuditAction::AuditExport, "audit_log")
        .context(json!({ "rows": entries.len() }));
    state.audit.log_action(&ctx, &auth_user.actor(), record).await;

    let filename = format!(
        "audit-log-{}.csv",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

fn render_csv(entries: &[AuditEntry]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + entries.len() * 160);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        let fields = [
            entry.id.to_string(),
            entry.created_at.to_rfc3339(),
            entry.username.clone(),
            entry
                .user_role
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            entry.action_type.clone(),
            entry.action_description.clone(),
            entry.resource_type.clone(),
            entry.resource_id.clone().unwrap_or_default(),
            entry.resource_name.clone().unwrap_or_default(),
            entry.outcome.as_str().to_string(),
            entry.ip_address.clone(),
            entry.browser.clone().unwrap_or_default(),
            entry.os.clone().unwrap_or_default(),
            entry
                .device_type
                .map(|d| d.as_str().to_string())
                .unwrap_or_default(),
            entry.city.clone().unwrap_or_default(),
            entry.country.clone().unwrap_or_default(),
            entry.session_id.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    out
}

async fn list_login_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<LoginLogQuery>,
) -> AppResult<ApiResponse<Vec<LoginLogEntry>>> {
    auth_user.require_admin()?;

    let entries = LoginLogRepository::new(&state.db)
        .list(&query)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list login logs: {}", e);
            AppError::internal("Failed to list login logs")
        })?;

    Ok(ApiResponse::data(entries))
}

/// POST /api/v1/audit-logs/cleanup
async fn cleanup_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    payload: Option<Json<CleanupRequest>>,
) -> AppResult<ApiResponse<CleanupReport>> {
    auth_user.require_admin()?;

    let retention_days = payload
        .and_then(|Json(req)| req.retention_days)
        .unwrap_or(state.config.audit.retention_days);
    if retention_days == 0 {
        return Err(AppError::bad_request("retention_days must be at least 1"));
    }

    let report = state.audit.cleanup(retention_days).await;

    let record = ActionRecord::new(AuditAction::AuditCleanup, "audit_log").context(json!({
        "retention_days": retention_days,
        "cutoff": report.cutoff,
        "deleted": report.total(),
    }));
    state.audit.log_action(&ctx, &auth_user.actor(), record).await;

    let message = format!("Removed {} expired log entries", report.total());
    Ok(ApiResponse::with_message(report, message))
}
