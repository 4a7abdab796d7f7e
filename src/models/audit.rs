//! Audit, login and activity log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DeviceType, UserRole};

/// Actions recorded in the audit trail
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    UserCreate,
    UserBan,
    UserUnban,
    UserDelete,
    UserRestore,
    UserPurge,
    LoginSuccess,
    LoginFailed,
    Logout,
    PageView,
    ResourceAccess,
    AuditExport,
    AuditCleanup,
    BrokenLinkReport,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserCreate => "user_create",
            AuditAction::UserBan => "user_ban",
            AuditAction::UserUnban => "user_unban",
            AuditAction::UserDelete => "user_delete",
            AuditAction::UserRestore => "user_restore",
            AuditAction::UserPurge => "user_purge",
            AuditAction::LoginSuccess => "login_success",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::PageView => "page_view",
            AuditAction::ResourceAccess => "resource_access",
            AuditAction::AuditExport => "audit_export",
            AuditAction::AuditCleanup => "audit_cleanup",
            AuditAction::BrokenLinkReport => "broken_link_report",
        }
    }

    /// Default human-readable description when the caller supplies none
    pub fn describe(&self) -> &'static str {
        match self {
            AuditAction::UserCreate => "Created user account",
            AuditAction::UserBan => "Banned user account",
            AuditAction::UserUnban => "Unbanned user account",
            AuditAction::UserDelete => "Deleted user account",
            AuditAction::UserRestore => "Restored user account",
            AuditAction::UserPurge => "Permanently deleted user account",
            AuditAction::LoginSuccess => "Logged in",
            AuditAction::LoginFailed => "Failed login attempt",
            AuditAction::Logout => "Logged out",
            AuditAction::PageView => "Viewed page",
            AuditAction::ResourceAccess => "Accessed resource",
            AuditAction::AuditExport => "Exported audit trail",
            AuditAction::AuditCleanup => "Purged expired log entries",
            AuditAction::BrokenLinkReport => "Reported broken link",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Failed,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Success => "Success",
            ActionOutcome::Failed => "Failed",
        }
    }
}

impl std::str::FromStr for ActionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(ActionOutcome::Success),
            "Failed" => Ok(ActionOutcome::Failed),
            _ => Err(format!("Invalid outcome: {}", s)),
        }
    }
}

/// Who performed an action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub username: String,
    pub role: Option<UserRole>,
}

impl Actor {
    pub fn user(user_id: Uuid, username: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: Some(user_id),
            username: username.into(),
            role: Some(role),
        }
    }

    /// An unauthenticated caller, e.g. a failed login for an unknown username
    pub fn anonymous(attempted_username: impl Into<String>) -> Self {
        Self {
            user_id: None,
            username: attempted_username.into(),
            role: None,
        }
    }

    pub fn system() -> Self {
        Self {
            user_id: None,
            username: "system".to_string(),
            role: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.map(|r| r.is_admin()).unwrap_or(false)
    }
}

/// A single append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: String,
    pub user_role: Option<UserRole>,
    pub action_type: String,
    pub action_description: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub outcome: ActionOutcome,
    pub ip_address: String,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<DeviceType>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub session_id: Option<String>,
    pub request_method: Option<String>,
    pub request_url: Option<String>,
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    pub user_id: Option<Uuid>,
    pub action_type: Option<String>,
    pub resource_type: Option<String>,
    pub outcome: Option<ActionOutcome>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Authentication attempt record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLogEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    /// The credential that was attempted, even when no such user exists
    pub username: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub ip_address: String,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<DeviceType>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoginLogQuery {
    pub username: Option<String>,
    pub success: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    PageView,
    ResourceAccess,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::PageView => "page_view",
            ActivityType::ResourceAccess => "resource_access",
        }
    }
}

/// Page view / resource access record in `user_activity_log`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: String,
    pub activity_type: String,
    pub page_url: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub ip_address: String,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<DeviceType>,
    pub session_id: Option<String>,
    pub duration_seconds: Option<i64>,
}

/// Rows removed per table by a retention cleanup
#[derive(Debug, Clone, Serialize, Default)]
pub struct CleanupReport {
    pub retention_days: u32,
    pub cutoff: String,
    pub deleted: Vec<(String, u64)>,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_capitalized() {
        assert_eq!(serde_json::to_string(&ActionOutcome::Failed).unwrap(), "\"Failed\"");
        assert_eq!("Success".parse::<ActionOutcome>().unwrap(), ActionOutcome::Success);
    }

    #[test]
    fn test_actor_admin_detection() {
        let admin = Actor::user(Uuid::new_v4(), "root", UserRole::Admin);
        assert!(admin.is_admin());
        assert!(!Actor::anonymous("guess").is_admin());
        assert!(!Actor::system().is_admin());
    }

    #[test]
    fn test_cleanup_report_total() {
        let report = CleanupReport {
            retention_days: 30,
            cutoff: "2026-01-01T00:00:00Z".to_string(),
            deleted: vec![("login_logs".to_string(), 3), ("audit_trail".to_string(), 2)],
        };
        assert_eq!(report.total(), 5);
    }
}
