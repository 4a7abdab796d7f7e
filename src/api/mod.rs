//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{middleware, AppState};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

mod activity;
mod audit_logs;
mod auth;
mod health;
mod monitoring;
mod users;

pub use health::*;
pub use users::LifecycleResponse;

/// Public API routes (no authentication required)
pub fn public_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        // Login is rate limited per client IP
        .nest("/auth", auth::public_routes(state))
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::protected_routes())
        .nest("/users", users::routes())
        .nest("/audit-logs", audit_logs::routes())
        .nest("/activity", activity::routes())
        .nest("/monitoring", monitoring::routes())
}

/// Assemble the full application router with middleware
///
/// Authentication is applied to the protected routes only, so login and the
/// health probes stay reachable without a token.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let timeout = Duration::from_secs(
        state
            .config
            .server
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
            .max(1),
    );

    Router::new()
        .nest("/api/v1", public_routes(state.clone()))
        .nest(
            "/api/v1",
            protected_routes().layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth_middleware,
            )),
        )
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
