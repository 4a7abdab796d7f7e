//! Authentication API endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    db::user_repository,
    middleware::{auth::create_access_token, login_rate_limit_middleware, AuthUser},
    models::{ApiResponse, AuditAction, RequestContext, User},
    services::{ActionRecord, AuthOutcome, AuthService, LoginAttempt},
    utils::{AppError, AppResult},
    AppState,
};

pub fn public_routes(state: AppState) -> Router<AppState> {
    Router::new().route(
        "/login",
        post(login).layer(axum::middleware::from_fn_with_state(
            state,
            login_rate_limit_middleware,
        )),
    )
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email address
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: User,
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    axum::Json(payload): axum::Json<LoginRequest>,
) -> AppResult<ApiResponse<LoginResponse>> {
    let outcome = match AuthService::new(state.db.clone())
        .authenticate(&payload.username, &payload.password)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Authentication failed: {:#}", e);
            state
                .audit
                .log_login(
                    &ctx,
                    LoginAttempt::failed(payload.username.trim(), None, "internal_error"),
                )
                .await;
            return Err(AppError::internal("Authentication failed"));
        }
    };

    let user = match outcome {
        AuthOutcome::Success(user) => user,
        failure => {
            let reason = failure.failure_reason().unwrap_or("invalid_credentials");
            let known = failure.user().map(|u| (u.id, u.role));
            state
                .audit
                .log_login(&ctx, LoginAttempt::failed(payload.username.trim(), known, reason))
                .await;

            return Err(match failure {
                AuthOutcome::Banned(_) => AppError::forbidden("Your account has been suspended"),
                AuthOutcome::Deleted(_) => AppError::forbidden("Your account has been deleted"),
                _ => AppError::unauthorized("Invalid username or password"),
            });
        }
    };

    let (access_token, session_id) = create_access_token(
        &user.id,
        &user.username,
        user.role,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )
    .map_err(|e| {
        error!("Failed to create access token: {}", e);
        AppError::internal("Failed to create access token")
    })?;

    // The session starts with this request
    let ctx = RequestContext {
        session_id: Some(session_id),
        ..ctx
    };
    state
        .audit
        .log_login(
            &ctx,
            LoginAttempt::succeeded(user.id, user.username.clone(), user.role),
        )
        .await;

    Ok(ApiResponse::with_message(
        LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.auth.token_expiry_hours * 3600,
            user,
        },
        "Login successful",
    ))
}

/// POST /api/v1/auth/logout
///
/// Tokens are stateless; this records the end of the session.
async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ctx: RequestContext,
) -> ApiResponse<()> {
    let record = ActionRecord::new(AuditAction::Logout, "session")
        .resource(&auth_user.session_id, auth_user.username.clone());
    state.audit.log_action(&ctx, &auth_user.actor(), record).await;

    ApiResponse::message("Logged out")
}

/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<ApiResponse<User>> {
    let user = user_repository::find_by_id(&state.db, auth_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(ApiResponse::data(user))
}
