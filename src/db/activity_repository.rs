//! User activity log repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{format_timestamp, parse_db_timestamp};
use crate::models::ActivityEntry;

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: String,
    created_at: String,
    user_id: Option<String>,
    username: String,
    activity_type: String,
    page_url: Option<String>,
    resource_type: Option<String>,
    resource_id: Option<String>,
    ip_address: String,
    browser: Option<String>,
    os: Option<String>,
    device_type: Option<String>,
    session_id: Option<String>,
    duration_seconds: Option<i64>,
}

pub struct ActivityRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ActivityRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &ActivityEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_activity_log (
                id, created_at, user_id, username, activity_type, page_url, resource_type,
                resource_id, ip_address, browser, os, device_type, session_id, duration_seconds
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(format_timestamp(&entry.created_at))
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.username)
        .bind(&entry.activity_type)
        .bind(entry.page_url.as_deref())
        .bind(entry.resource_type.as_deref())
        .bind(entry.resource_id.as_deref())
        .bind(&entry.ip_address)
        .bind(entry.browser.as_deref())
        .bind(entry.os.as_deref())
        .bind(entry.device_type.map(|d| d.as_str()))
        .bind(entry.session_id.as_deref())
        .bind(entry.duration_seconds)
        .execute(self.pool)
        .await
        .context("Failed to insert activity log")?;

        Ok(())
    }

    /// Most recent activity for one user
    pub async fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<ActivityEntry>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, created_at, user_id, username, activity_type, page_url, resource_type,
                   resource_id, ip_address, browser, os, device_type, session_id, duration_seconds
            FROM user_activity_log
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit.min(1000) as i64)
        .fetch_all(self.pool)
        .await
        .context("Failed to list activity")?;

        Ok(rows.into_iter().map(row_to_activity).collect())
    }
}

fn row_to_activity(row: ActivityRow) -> ActivityEntry {
    ActivityEntry {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        created_at: parse_db_timestamp(&row.created_at),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        username: row.username,
        activity_type: row.activity_type,
        page_url: row.page_url,
        resource_type: row.resource_type,
        resource_id: row.resource_id,
        ip_address: row.ip_address,
        browser: row.browser,
        os: row.os,
        device_type: row.device_type.as_deref().and_then(|s| s.parse().ok()),
        session_id: row.session_id,
        duration_seconds: row.duration_seconds,
    }
}
