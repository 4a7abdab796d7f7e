//! `RequestContext` extractor
//!
//! Collects the client IP, parsed user agent and session for the audit
//! loggers. Never rejects.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::headers::UserAgent;
use axum_extra::TypedHeader;

use crate::middleware::AuthUser;
use crate::models::{DeviceInfo, RequestContext};
use crate::services::ip_resolver::resolve_client_ip;
use crate::services::user_agent::parse_user_agent;
use crate::AppState;

/// Session header honoured for unauthenticated requests
pub const SESSION_HEADER: &str = "x-session-id";

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip_address = resolve_client_ip(
            &parts.headers,
            remote,
            state.config.audit.trust_proxy_headers,
        );

        let user_agent = TypedHeader::<UserAgent>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(ua)| ua.as_str().to_string());
        let device = user_agent
            .as_deref()
            .map(parse_user_agent)
            .unwrap_or_else(DeviceInfo::default);

        let session_id = parts
            .extensions
            .get::<AuthUser>()
            .map(|u| u.session_id.clone())
            .or_else(|| {
                parts
                    .headers
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.chars().take(128).collect())
            });

        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Ok(RequestContext {
            ip_address,
            user_agent,
            device,
            session_id,
            method: parts.method.to_string(),
            url,
        })
    }
}
