//! Audit trail repository
//!
//! `comprehensive_audit_trail` holds the full enriched record. The two
//! legacy tables predate it and store a subset; they remain writable so
//! installations mid-migration keep an audit trail.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{format_timestamp, parse_db_timestamp};
use crate::models::{ActionOutcome, AuditEntry, AuditLogQuery};

/// Destination tables for audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTable {
    Comprehensive,
    AdminAuditLog,
    AuditTrail,
}

impl AuditTable {
    pub fn name(&self) -> &'static str {
        match self {
            AuditTable::Comprehensive => "comprehensive_audit_trail",
            AuditTable::AdminAuditLog => "admin_audit_log",
            AuditTable::AuditTrail => "audit_trail",
        }
    }

    pub fn all() -> [AuditTable; 3] {
        [
            AuditTable::Comprehensive,
            AuditTable::AdminAuditLog,
            AuditTable::AuditTrail,
        ]
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    created_at: String,
    user_id: Option<String>,
    username: String,
    user_role: Option<String>,
    action_type: String,
    action_description: String,
    resource_type: String,
    resource_id: Option<String>,
    resource_name: Option<String>,
    outcome: String,
    ip_address: String,
    browser: Option<String>,
    os: Option<String>,
    device_type: Option<String>,
    city: Option<String>,
    country: Option<String>,
    session_id: Option<String>,
    request_method: Option<String>,
    request_url: Option<String>,
    context: Option<String>,
}

pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_into(&self, table: AuditTable, entry: &AuditEntry) -> Result<()> {
        match table {
            AuditTable::Comprehensive => self.insert_comprehensive(entry).await,
            AuditTable::AdminAuditLog => self.insert_admin_log(entry).await,
            AuditTable::AuditTrail => self.insert_audit_trail(entry).await,
        }
    }

    pub async fn insert_comprehensive(&self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comprehensive_audit_trail (
                id, created_at, user_id, username, user_role, action_type, action_description,
                resource_type, resource_id, resource_name, outcome, ip_address, browser, os,
                device_type, city, country, session_id, request_method, request_url, context
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(format_timestamp(&entry.created_at))
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.username)
        .bind(entry.user_role.map(|r| r.as_str()))
        .bind(&entry.action_type)
        .bind(&entry.action_description)
        .bind(&entry.resource_type)
        .bind(entry.resource_id.as_deref())
        .bind(entry.resource_name.as_deref())
        .bind(entry.outcome.as_str())
        .bind(&entry.ip_address)
        .bind(entry.browser.as_deref())
        .bind(entry.os.as_deref())
        .bind(entry.device_type.map(|d| d.as_str()))
        .bind(entry.city.as_deref())
        .bind(entry.country.as_deref())
        .bind(entry.session_id.as_deref())
        .bind(entry.request_method.as_deref())
        .bind(entry.request_url.as_deref())
        .bind(entry.context.as_ref().map(|c| c.to_string()))
        .execute(self.pool)
        .await
        .context("Failed to insert into comprehensive_audit_trail")?;

        Ok(())
    }

    /// Legacy admin table: device, geo and request fields are folded into `details`
    pub async fn insert_admin_log(&self, entry: &AuditEntry) -> Result<()> {
        let details = serde_json::json!({
            "description": entry.action_description,
            "resource_name": entry.resource_name,
            "outcome": entry.outcome.as_str(),
            "browser": entry.browser,
            "os": entry.os,
            "device_type": entry.device_type,
            "city": entry.city,
            "country": entry.country,
            "session_id": entry.session_id,
            "request_method": entry.request_method,
            "request_url": entry.request_url,
            "context": entry.context,
        });

        sqlx::query(
            r#"
            INSERT INTO admin_audit_log (
                id, admin_id, admin_username, action, target_type, target_id,
                details, ip_address, user_agent, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.username)
        .bind(&entry.action_type)
        .bind(&entry.resource_type)
        .bind(entry.resource_id.as_deref())
        .bind(details.to_string())
        .bind(&entry.ip_address)
        .bind(entry.browser.as_deref())
        .bind(format_timestamp(&entry.created_at))
        .execute(self.pool)
        .await
        .context("Failed to insert into admin_audit_log")?;

        Ok(())
    }

    pub async fn insert_audit_trail(&self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_trail (
                id, user_id, username, user_role, action, resource_type, resource_id,
                description, outcome, ip_address, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.username)
        .bind(entry.user_role.map(|r| r.as_str()))
        .bind(&entry.action_type)
        .bind(&entry.resource_type)
        .bind(entry.resource_id.as_deref())
        .bind(&entry.action_description)
        .bind(entry.outcome.as_str())
        .bind(&entry.ip_address)
        .bind(format_timestamp(&entry.created_at))
        .execute(self.pool)
        .await
        .context("Failed to insert into audit_trail")?;

        Ok(())
    }

    /// List entries from the comprehensive table, newest first
    pub async fn list(&self, query: &AuditLogQuery) -> Result<Vec<AuditEntry>> {
        let mut sql = String::from(
            "SELECT id, created_at, user_id, username, user_role, action_type, action_description, \
             resource_type, resource_id, resource_name, outcome, ip_address, browser, os, device_type, \
             city, country, session_id, request_method, request_url, context \
             FROM comprehensive_audit_trail WHERE 1 = 1",
        );

        if query.user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        if query.action_type.is_some() {
            sql.push_str(" AND action_type = ?");
        }
        if query.resource_type.is_some() {
            sql.push_str(" AND resource_type = ?");
        }
        if query.outcome.is_some() {
            sql.push_str(" AND outcome = ?");
        }
        if query.from.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if query.to.is_some() {
            sql.push_str(" AND created_at < ?");
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, AuditRow>(&sql);
        if let Some(user_id) = query.user_id {
            q = q.bind(user_id.to_string());
        }
        if let Some(ref action_type) = query.action_type {
            q = q.bind(action_type);
        }
        if let Some(ref resource_type) = query.resource_type {
            q = q.bind(resource_type);
        }
        if let Some(outcome) = query.outcome {
            q = q.bind(outcome.as_str());
        }
        if let Some(from) = query.from {
            q = q.bind(format_timestamp(&from));
        }
        if let Some(to) = query.to {
            q = q.bind(format_timestamp(&to));
        }
        q = q.bind(query.limit.unwrap_or(100).min(10_000) as i64);
        q = q.bind(query.offset.unwrap_or(0) as i64);

        let rows = q
            .fetch_all(self.pool)
            .await
            .context("Failed to list audit logs")?;

        Ok(rows.into_iter().map(row_to_audit).collect())
    }

    /// Delete rows older than `cutoff` from any log table with a timestamp column
    ///
    /// `table` and `column` must be trusted identifiers.
    pub async fn delete_older_than(&self, table: &str, column: &str, cutoff: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE {} < ?", table, column);
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(self.pool)
            .await
            .with_context(|| format!("Failed to purge {}", table))?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self, table: AuditTable) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        sqlx::query_scalar(&sql)
            .fetch_one(self.pool)
            .await
            .with_context(|| format!("Failed to count {}", table.name()))
    }
}

fn row_to_audit(row: AuditRow) -> AuditEntry {
    AuditEntry {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        created_at: parse_db_timestamp(&row.created_at),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        username: row.username,
        user_role: row.user_role.as_deref().and_then(|s| s.parse().ok()),
        action_type: row.action_type,
        action_description: row.action_description,
        resource_type: row.resource_type,
        resource_id: row.resource_id,
        resource_name: row.resource_name,
        outcome: row.outcome.parse().unwrap_or(ActionOutcome::Failed),
        ip_address: row.ip_address,
        browser: row.browser,
        os: row.os,
        device_type: row.device_type.as_deref().and_then(|s| s.parse().ok()),
        city: row.city,
        country: row.country,
        session_id: row.session_id,
        request_method: row.request_method,
        request_url: row.request_url,
        context: row.context.and_then(|s| serde_json::from_str(&s).ok()),
    }
}
