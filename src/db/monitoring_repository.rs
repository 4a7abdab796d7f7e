//! Broken link reports and health samples

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{format_timestamp, parse_db_timestamp};
use crate::models::{BrokenLinkReport, HealthMetric};

#[derive(Debug, sqlx::FromRow)]
struct BrokenLinkRow {
    id: String,
    url: String,
    referrer: Option<String>,
    status_code: Option<i64>,
    reported_by: Option<String>,
    ip_address: String,
    created_at: String,
}

pub struct MonitoringRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MonitoringRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_broken_link(&self, report: &BrokenLinkReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO broken_links (id, url, referrer, status_code, reported_by, ip_address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.id.to_string())
        .bind(&report.url)
        .bind(report.referrer.as_deref())
        .bind(report.status_code)
        .bind(report.reported_by.map(|u| u.to_string()))
        .bind(&report.ip_address)
        .bind(format_timestamp(&report.created_at))
        .execute(self.pool)
        .await
        .context("Failed to insert broken link report")?;

        Ok(())
    }

    pub async fn list_broken_links(&self, limit: u32) -> Result<Vec<BrokenLinkReport>> {
        let rows = sqlx::query_as::<_, BrokenLinkRow>(
            r#"
            SELECT id, url, referrer, status_code, reported_by, ip_address, created_at
            FROM broken_links
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit.min(1000) as i64)
        .fetch_all(self.pool)
        .await
        .context("Failed to list broken links")?;

        Ok(rows
            .into_iter()
            .map(|row| BrokenLinkReport {
                id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
                url: row.url,
                referrer: row.referrer,
                status_code: row.status_code,
                reported_by: row.reported_by.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
                ip_address: row.ip_address,
                created_at: parse_db_timestamp(&row.created_at),
            })
            .collect())
    }

    pub async fn record_health_metric(&self, metric: &HealthMetric) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_health_metrics (id, recorded_at, metric_name, status, value, message)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(format_timestamp(&Utc::now()))
        .bind(&metric.metric_name)
        .bind(&metric.status)
        .bind(metric.value)
        .bind(metric.message.as_deref())
        .execute(self.pool)
        .await
        .context("Failed to record health metric")?;

        Ok(())
    }

    pub async fn record_uptime(&self, status: &str, uptime_seconds: u64, version: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_uptime_log (id, checked_at, status, uptime_seconds, version)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(format_timestamp(&Utc::now()))
        .bind(status)
        .bind(uptime_seconds as i64)
        .bind(version)
        .execute(self.pool)
        .await
        .context("Failed to record uptime sample")?;

        Ok(())
    }

    pub async fn count_health_metrics(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM system_health_metrics")
            .fetch_one(self.pool)
            .await
            .context("Failed to count health metrics")
    }
}
