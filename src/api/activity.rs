//! User activity tracking endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    db::ActivityRepository,
    middleware::AuthUser,
    models::{ActivityEntry, ApiResponse, RequestContext},
    utils::{AppError, AppResult},
    AppState,
};

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/page-view", post(record_page_view))
        .route("/resource-access", post(record_resource_access))
        .route("/me", get(my_activity))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PageViewRequest {
    #[validate(length(min = 1, max = 2048))]
    pub page_url: String,
    #[validate(range(min = 0))]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResourceAccessRequest {
    #[validate(length(min = 1, max = 64))]
    pub resource_type: String,
    #[validate(length(min = 1, max = 128))]
    pub resource_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

async fn record_page_view(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Json(payload): Json<PageViewRequest>,
) -> AppResult<ApiResponse<()>> {
    payload.validate()?;

    state
        .audit
        .log_page_view(
            &ctx,
            &auth_user.actor(),
            &payload.page_url,
            payload.duration_seconds,
        )
        .await;

    Ok(ApiResponse::message("Page view recorded"))
}

async fn record_resource_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Json(payload): Json<ResourceAccessRequest>,
) -> AppResult<ApiResponse<()>> {
    payload.validate()?;

    state
        .audit
        .log_resource_access(
            &ctx,
            &auth_user.actor(),
            &payload.resource_type,
            &payload.resource_id,
        )
        .await;

    Ok(ApiResponse::message("Resource access recorded"))
}

/// GET /api/v1/activity/me
async fn my_activity(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<ApiResponse<Vec<ActivityEntry>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let entries = ActivityRepository::new(&state.db)
        .list_for_user(auth_user.id, limit)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load activity for {}: {}", auth_user.username, e);
            AppError::internal("Failed to load activity")
        })?;

    Ok(ApiResponse::data(entries))
}
