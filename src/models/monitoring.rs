//! Site monitoring models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenLinkReport {
    pub id: Uuid,
    pub url: String,
    pub referrer: Option<String>,
    pub status_code: Option<i64>,
    pub reported_by: Option<Uuid>,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReportBrokenLinkRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[validate(length(max = 2048))]
    pub referrer: Option<String>,
    #[validate(range(min = 100, max = 599))]
    pub status_code: Option<i64>,
}

/// One component status sample, written by the detailed health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthMetric {
    pub metric_name: String,
    pub status: String,
    pub value: Option<f64>,
    pub message: Option<String>,
}
