//! User management API endpoints
//!
//! All routes require the admin role.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::{
        ApiResponse, BanUserRequest, CreateUserRequest, LifecycleOutcome, RequestContext, User,
        UserListQuery,
    },
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).delete(soft_delete_user))
        .route("/{id}/ban", post(ban_user))
        .route("/{id}/unban", post(unban_user))
        .route("/{id}/restore", post(restore_user))
        .route("/{id}/permanent", delete(permanently_delete_user))
}

/// Envelope for lifecycle changes; `email_sent` reports the notification
#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub success: bool,
    pub message: String,
    pub email_sent: bool,
    pub data: User,
}

impl LifecycleResponse {
    fn new(outcome: LifecycleOutcome, message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            email_sent: outcome.email_sent,
            data: outcome.user,
        }
    }
}

impl IntoResponse for LifecycleResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::bad_request(format!("Invalid user id: {}", id)))
}

async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<ApiResponse<Vec<User>>> {
    auth_user.require_admin()?;
    let users = state.user_admin().list_users(&query).await?;
    Ok(ApiResponse::data(users))
}

async fn get_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<User>> {
    auth_user.require_admin()?;
    let user = state.user_admin().get_user(parse_id(&id)?).await?;
    Ok(ApiResponse::data(user))
}

async fn create_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, LifecycleResponse)> {
    auth_user.require_admin()?;
    let outcome = state
        .user_admin()
        .create_user(&ctx, &auth_user.actor(), payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        LifecycleResponse::new(outcome, "User created"),
    ))
}

async fn ban_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Option<Json<BanUserRequest>>,
) -> AppResult<LifecycleResponse> {
    auth_user.require_admin()?;
    let reason = payload.and_then(|Json(req)| req.reason);
    let outcome = state
        .user_admin()
        .ban_user(&ctx, &auth_user.actor(), parse_id(&id)?, reason)
        .await?;
    Ok(LifecycleResponse::new(outcome, "User banned"))
}

async fn unban_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<LifecycleResponse> {
    auth_user.require_admin()?;
    let outcome = state
        .user_admin()
        .unban_user(&ctx, &auth_user.actor(), parse_id(&id)?)
        .await?;
    Ok(LifecycleResponse::new(outcome, "User unbanned"))
}

async fn soft_delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<LifecycleResponse> {
    auth_user.require_admin()?;
    let outcome = state
        .user_admin()
        .soft_delete_user(&ctx, &auth_user.actor(), parse_id(&id)?)
        .await?;
    Ok(LifecycleResponse::new(outcome, "User deleted"))
}

async fn restore_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<LifecycleResponse> {
    auth_user.require_admin()?;
    let outcome = state
        .user_admin()
        .restore_user(&ctx, &auth_user.actor(), parse_id(&id)?)
        .await?;
    Ok(LifecycleResponse::new(outcome, "User restored"))
}

async fn permanently_delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<LifecycleResponse> {
    auth_user.require_admin()?;
    let outcome = state
        .user_admin()
        .permanently_delete_user(&ctx, &auth_user.actor(), parse_id(&id)?)
        .await?;
    Ok(LifecycleResponse::new(outcome, "User permanently deleted"))
}
