//! Site monitoring endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::MonitoringRepository,
    middleware::AuthUser,
    models::{ApiResponse, AuditAction, BrokenLinkReport, ReportBrokenLinkRequest, RequestContext},
    services::ActionRecord,
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/broken-links",
        post(report_broken_link).get(list_broken_links),
    )
}

#[derive(Debug, Deserialize)]
pub struct BrokenLinkQuery {
    pub limit: Option<u32>,
}

/// POST /api/v1/monitoring/broken-links
///
/// Any signed-in user may report a dead link.
async fn report_broken_link(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Json(payload): Json<ReportBrokenLinkRequest>,
) -> AppResult<(StatusCode, ApiResponse<BrokenLinkReport>)> {
    payload.validate()?;

    let report = BrokenLinkReport {
        id: Uuid::new_v4(),
        url: payload.url,
        referrer: payload.referrer,
        status_code: payload.status_code,
        reported_by: Some(auth_user.id),
        ip_address: ctx.ip_address.clone(),
        created_at: Utc::now(),
    };

    MonitoringRepository::new(&state.db)
        .insert_broken_link(&report)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store broken link report: {}", e);
            AppError::internal("Failed to store broken link report")
        })?;

    let record = ActionRecord::new(AuditAction::BrokenLinkReport, "broken_link")
        .resource(report.id, report.url.clone());
    state.audit.log_action(&ctx, &auth_user.actor(), record).await;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(report, "Broken link reported"),
    ))
}

async fn list_broken_links(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<BrokenLinkQuery>,
) -> AppResult<ApiResponse<Vec<BrokenLinkReport>>> {
    auth_user.require_admin()?;

    let reports = MonitoringRepository::new(&state.db)
        .list_broken_links(query.limit.unwrap_or(100))
        .await
        .map_err(|e| {
            tracing::error!("Failed to list broken links: {}", e);
            AppError::internal("Failed to list broken links")
        })?;

    Ok(ApiResponse::data(reports))
}
