//! Login rate limiting
//!
//! Keyed by the resolved client IP, so clients behind the same proxy are
//! told apart when proxy headers are trusted. Uses the governor crate with a
//! keyed rate limiter.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::services::ip_resolver::resolve_client_ip;
use crate::utils::AppError;
use crate::AppState;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-IP limiter for authentication attempts
#[derive(Clone)]
pub struct LoginRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl LoginRateLimiter {
    pub fn per_minute(attempts: u32) -> Self {
        let attempts = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(attempts).allow_burst(attempts);
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Consume one attempt for `ip`; false when the quota is exhausted
    pub fn check(&self, ip: &str) -> bool {
        self.limiter.check_key(&ip.to_string()).is_ok()
    }

    /// Drop state for keys whose quota has fully replenished
    pub fn cleanup(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!("Login rate limiter cleanup: {} -> {} entries", before, self.limiter.len());
    }
}

/// Rate limiting middleware for the login route
pub async fn login_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = resolve_client_ip(
        request.headers(),
        remote,
        state.config.audit.trust_proxy_headers,
    );

    if state.login_limiter.check(&ip) {
        next.run(request).await
    } else {
        warn!(ip = %ip, "Login rate limit exceeded");
        let mut response =
            AppError::RateLimited("Too many login attempts. Please try again later.".to_string())
                .into_response();
        response
            .headers_mut()
            .insert("Retry-After", axum::http::HeaderValue::from_static("60"));
        response
    }
}

/// Spawn a background task to periodically clean up limiter state
pub fn spawn_rate_limit_cleanup(limiter: LoginRateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });
}
