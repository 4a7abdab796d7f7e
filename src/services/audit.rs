//! Audit and activity logging
//!
//! `AuditLogger` is what handlers call. It enriches each record with the
//! request's device and location, then hands it to the writer. Nothing here
//! returns an error: a failed log write is reported through tracing and the
//! triggering operation carries on.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{
    format_timestamp, table_exists, ActivityRepository, AuditRepository, DbPool,
    LoginLogRepository,
};
use crate::models::{
    ActionOutcome, ActivityEntry, ActivityType, Actor, AuditAction, AuditEntry, CleanupReport,
    GeoLocation, LoginLogEntry, RequestContext, UserRole,
};
use crate::services::audit_writer::{AuditWriter, WriteOutcome};
use crate::services::geolocation::GeoLocator;

/// Log tables subject to retention cleanup, with their timestamp column
pub const RETENTION_TABLES: &[(&str, &str)] = &[
    ("comprehensive_audit_trail", "created_at"),
    ("admin_audit_log", "created_at"),
    ("audit_trail", "created_at"),
    ("login_logs", "created_at"),
    ("user_activity_log", "created_at"),
    ("system_health_metrics", "recorded_at"),
    ("system_uptime_log", "checked_at"),
];

/// What was done, to which resource, and how it went
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub action: AuditAction,
    pub description: Option<String>,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub outcome: ActionOutcome,
    pub context: Option<Value>,
}

impl ActionRecord {
    pub fn new(action: AuditAction, resource_type: impl Into<String>) -> Self {
        Self {
            action,
            description: None,
            resource_type: resource_type.into(),
            resource_id: None,
            resource_name: None,
            outcome: ActionOutcome::Success,
            context: None,
        }
    }

    pub fn resource(mut self, id: impl ToString, name: impl Into<String>) -> Self {
        self.resource_id = Some(id.to_string());
        self.resource_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.outcome = ActionOutcome::Failed;
        let reason = reason.into();
        let mut context = self.context.take().unwrap_or_else(|| serde_json::json!({}));
        if let Some(obj) = context.as_object_mut() {
            obj.insert("error".to_string(), Value::String(reason));
        }
        self.context = Some(context);
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// A single authentication attempt
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    /// The credential as typed, even if no such user exists
    pub username: String,
    pub user: Option<(Uuid, UserRole)>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl LoginAttempt {
    pub fn succeeded(user_id: Uuid, username: impl Into<String>, role: UserRole) -> Self {
        Self {
            username: username.into(),
            user: Some((user_id, role)),
            success: true,
            failure_reason: None,
        }
    }

    pub fn failed(
        username: impl Into<String>,
        user: Option<(Uuid, UserRole)>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            user,
            success: false,
            failure_reason: Some(reason.into()),
        }
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    pool: DbPool,
    writer: AuditWriter,
    geo: Arc<GeoLocator>,
}

impl AuditLogger {
    pub fn new(pool: DbPool, geo: Arc<GeoLocator>) -> Self {
        Self {
            writer: AuditWriter::new(pool.clone()),
            pool,
            geo,
        }
    }

    async fn locate(&self, ctx: &RequestContext) -> GeoLocation {
        self.geo.lookup(&ctx.ip_address).await
    }

    /// Record an administrative or user action
    pub async fn log_action(
        &self,
        ctx: &RequestContext,
        actor: &Actor,
        record: ActionRecord,
    ) -> WriteOutcome {
        let geo = self.locate(ctx).await;
        let entry = build_entry(ctx, actor, record, &geo);
        self.writer.write(&entry).await
    }

    /// Record a login attempt in `login_logs` and the audit trail
    pub async fn log_login(&self, ctx: &RequestContext, attempt: LoginAttempt) {
        let geo = self.locate(ctx).await;

        let entry = LoginLogEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            user_id: attempt.user.map(|(id, _)| id),
            username: attempt.username.clone(),
            success: attempt.success,
            failure_reason: attempt.failure_reason.clone(),
            ip_address: ctx.ip_address.clone(),
            browser: Some(ctx.device.browser.clone()),
            os: Some(ctx.device.os.clone()),
            device_type: Some(ctx.device.device_type),
            city: geo.city.clone(),
            country: geo.country.clone(),
            session_id: ctx.session_id.clone(),
        };

        if let Err(e) = LoginLogRepository::new(&self.pool).insert(&entry).await {
            warn!(username = %attempt.username, error = %e, "Failed to write login log");
        }

        let actor = match attempt.user {
            Some((id, role)) => Actor::user(id, attempt.username.clone(), role),
            None => Actor::anonymous(attempt.username.clone()),
        };
        let record = if attempt.success {
            ActionRecord::new(AuditAction::LoginSuccess, "session")
        } else {
            ActionRecord::new(AuditAction::LoginFailed, "session").failed(
                attempt
                    .failure_reason
                    .unwrap_or_else(|| "invalid_credentials".to_string()),
            )
        };
        let audit = build_entry(ctx, &actor, record, &geo);
        self.writer.write(&audit).await;
    }

    /// Write a row to `user_activity_log`
    pub async fn log_activity(
        &self,
        ctx: &RequestContext,
        actor: &Actor,
        activity: ActivityType,
        page_url: Option<String>,
        resource: Option<(String, String)>,
        duration_seconds: Option<i64>,
    ) {
        let (resource_type, resource_id) = match resource {
            Some((kind, id)) => (Some(kind), Some(id)),
            None => (None, None),
        };

        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            user_id: actor.user_id,
            username: actor.username.clone(),
            activity_type: activity.as_str().to_string(),
            page_url,
            resource_type,
            resource_id,
            ip_address: ctx.ip_address.clone(),
            browser: Some(ctx.device.browser.clone()),
            os: Some(ctx.device.os.clone()),
            device_type: Some(ctx.device.device_type),
            session_id: ctx.session_id.clone(),
            duration_seconds,
        };

        if let Err(e) = ActivityRepository::new(&self.pool).insert(&entry).await {
            warn!(
                username = %actor.username,
                activity = activity.as_str(),
                error = %e,
                "Failed to write activity log"
            );
        }
    }

    pub async fn log_page_view(
        &self,
        ctx: &RequestContext,
        actor: &Actor,
        page_url: &str,
        duration_seconds: Option<i64>,
    ) {
        self.log_activity(
            ctx,
            actor,
            ActivityType::PageView,
            Some(page_url.to_string()),
            None,
            duration_seconds,
        )
        .await
    }

    pub async fn log_resource_access(
        &self,
        ctx: &RequestContext,
        actor: &Actor,
        resource_type: &str,
        resource_id: &str,
    ) {
        self.log_activity(
            ctx,
            actor,
            ActivityType::ResourceAccess,
            Some(ctx.url.clone()).filter(|u| !u.is_empty()),
            Some((resource_type.to_string(), resource_id.to_string())),
            None,
        )
        .await
    }

    /// Delete log rows older than `retention_days` from every log table present
    pub async fn cleanup(&self, retention_days: u32) -> CleanupReport {
        let cutoff = format_timestamp(&(Utc::now() - Duration::days(retention_days as i64)));
        let repo = AuditRepository::new(&self.pool);
        let mut report = CleanupReport {
            retention_days,
            cutoff: cutoff.clone(),
            deleted: Vec::new(),
        };

        for (table, column) in RETENTION_TABLES {
            if !table_exists(&self.pool, table).await {
                continue;
            }
            match repo.delete_older_than(table, column, &cutoff).await {
                Ok(n) => report.deleted.push((table.to_string(), n)),
                Err(e) => warn!(table = table, error = %e, "Retention cleanup failed"),
            }
        }

        info!(
            retention_days = retention_days,
            cutoff = %cutoff,
            deleted = report.total(),
            "Log retention cleanup complete"
        );
        report
    }
}

fn build_entry(
    ctx: &RequestContext,
    actor: &Actor,
    record: ActionRecord,
    geo: &GeoLocation,
) -> AuditEntry {
    AuditEntry {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        user_id: actor.user_id,
        username: actor.username.clone(),
        user_role: actor.role,
        action_type: record.action.as_str().to_string(),
        action_description: record
            .description
            .unwrap_or_else(|| record.action.describe().to_string()),
        resource_type: record.resource_type,
        resource_id: record.resource_id,
        resource_name: record.resource_name,
        outcome: record.outcome,
        ip_address: ctx.ip_address.clone(),
        browser: Some(ctx.device.browser.clone()),
        os: Some(ctx.device.os.clone()),
        device_type: Some(ctx.device.device_type),
        city: geo.city.clone(),
        country: geo.country.clone(),
        session_id: ctx.session_id.clone(),
        request_method: Some(ctx.method.clone()).filter(|m| !m.is_empty()),
        request_url: Some(ctx.url.clone()).filter(|u| !u.is_empty()),
        context: record.context,
    }
}
