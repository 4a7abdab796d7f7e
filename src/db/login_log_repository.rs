//! Login attempt log repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{format_timestamp, parse_db_timestamp};
use crate::models::{LoginLogEntry, LoginLogQuery};

#[derive(Debug, sqlx::FromRow)]
struct LoginLogRow {
    id: String,
    created_at: String,
    user_id: Option<String>,
    username: String,
    success: i64,
    failure_reason: Option<String>,
    ip_address: String,
    browser: Option<String>,
    os: Option<String>,
    device_type: Option<String>,
    city: Option<String>,
    country: Option<String>,
    session_id: Option<String>,
}

pub struct LoginLogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LoginLogRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &LoginLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO login_logs (
                id, created_at, user_id, username, success, failure_reason,
                ip_address, browser, os, device_type, city, country, session_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(format_timestamp(&entry.created_at))
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.username)
        .bind(entry.success as i64)
        .bind(entry.failure_reason.as_deref())
        .bind(&entry.ip_address)
        .bind(entry.browser.as_deref())
        .bind(entry.os.as_deref())
        .bind(entry.device_type.map(|d| d.as_str()))
        .bind(entry.city.as_deref())
        .bind(entry.country.as_deref())
        .bind(entry.session_id.as_deref())
        .execute(self.pool)
        .await
        .context("Failed to insert login log")?;

        Ok(())
    }

    pub async fn list(&self, query: &LoginLogQuery) -> Result<Vec<LoginLogEntry>> {
        let mut sql = String::from(
            "SELECT id, created_at, user_id, username, success, failure_reason, ip_address, \
             browser, os, device_type, city, country, session_id FROM login_logs WHERE 1 = 1",
        );
        if query.username.is_some() {
            sql.push_str(" AND username = ?");
        }
        if query.success.is_some() {
            sql.push_str(" AND success = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, LoginLogRow>(&sql);
        if let Some(ref username) = query.username {
            q = q.bind(username);
        }
        if let Some(success) = query.success {
            q = q.bind(success as i64);
        }
        q = q.bind(query.limit.unwrap_or(100).min(10_000) as i64);
        q = q.bind(query.offset.unwrap_or(0) as i64);

        let rows = q
            .fetch_all(self.pool)
            .await
            .context("Failed to list login logs")?;

        Ok(rows.into_iter().map(row_to_login_log).collect())
    }

    /// Failed attempts for `username` since `since`
    pub async fn count_failures_since(&self, username: &str, since: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM login_logs WHERE username = ? AND success = 0 AND created_at >= ?",
        )
        .bind(username)
        .bind(format_timestamp(&since))
        .fetch_one(self.pool)
        .await
        .context("Failed to count login failures")
    }
}

fn row_to_login_log(row: LoginLogRow) -> LoginLogEntry {
    LoginLogEntry {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        created_at: parse_db_timestamp(&row.created_at),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        username: row.username,
        success: row.success != 0,
        failure_reason: row.failure_reason,
        ip_address: row.ip_address,
        browser: row.browser,
        os: row.os,
        device_type: row.device_type.as_deref().and_then(|s| s.parse().ok()),
        city: row.city,
        country: row.country,
        session_id: row.session_id,
    }
}
