//! Request-scoped context passed explicitly to loggers and services

use serde::Serialize;

use crate::models::DeviceInfo;

/// Where a request came from and what it asked for
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    /// Best-guess client IP, or `"unknown"`
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub device: DeviceInfo,
    pub session_id: Option<String>,
    pub method: String,
    pub url: String,
}

impl RequestContext {
    /// Context for work not triggered by an HTTP request (CLI, background tasks)
    pub fn system() -> Self {
        Self {
            ip_address: crate::services::ip_resolver::UNKNOWN_IP.to_string(),
            user_agent: None,
            device: DeviceInfo::default(),
            session_id: None,
            method: "CLI".to_string(),
            url: String::new(),
        }
    }
}
