//! User account storage
//!
//! Functions take any SQLite executor so the lifecycle service can run them
//! inside a transaction (`&mut *tx`) while read paths use the pool directly.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::db::{format_timestamp, parse_db_timestamp, parse_optional_timestamp};
use crate::models::{User, UserListQuery, UserRole, UserStatus};

const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, role, status, \
     ban_reason, banned_at, deleted_at, last_login_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    full_name: String,
    password_hash: String,
    role: String,
    status: String,
    ban_reason: Option<String>,
    banned_at: Option<String>,
    deleted_at: Option<String>,
    last_login_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn row_to_user(row: UserRow) -> User {
    User {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        username: row.username,
        email: row.email,
        full_name: row.full_name,
        password_hash: row.password_hash,
        role: row.role.parse().unwrap_or(UserRole::Student),
        status: row.status.parse().unwrap_or_default(),
        ban_reason: row.ban_reason,
        banned_at: parse_optional_timestamp(row.banned_at.as_deref()),
        deleted_at: parse_optional_timestamp(row.deleted_at.as_deref()),
        last_login_at: parse_optional_timestamp(row.last_login_at.as_deref()),
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}

pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to fetch user")?;

    Ok(row.map(row_to_user))
}

/// Case-insensitive lookup by username or email
pub async fn find_by_login<'e, E>(executor: E, login: &str) -> Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM users WHERE username = ? COLLATE NOCASE OR email = ? COLLATE NOCASE LIMIT 1",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(login)
        .bind(login)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch user by login")?;

    Ok(row.map(row_to_user))
}

pub async fn insert<'e, E>(executor: E, user: &User) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO users (
            id, username, email, full_name, password_hash, role, status,
            ban_reason, banned_at, deleted_at, last_login_at, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(user.ban_reason.as_deref())
    .bind(user.banned_at.as_ref().map(format_timestamp))
    .bind(user.deleted_at.as_ref().map(format_timestamp))
    .bind(user.last_login_at.as_ref().map(format_timestamp))
    .bind(format_timestamp(&user.created_at))
    .bind(format_timestamp(&user.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Status change with the lifecycle columns that go with it
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: UserStatus,
    pub ban_reason: Option<String>,
    pub banned_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn banned(reason: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: UserStatus::Banned,
            ban_reason: reason,
            banned_at: Some(at),
            deleted_at: None,
        }
    }

    /// Active with ban and deletion markers cleared
    pub fn active() -> Self {
        Self {
            status: UserStatus::Active,
            ban_reason: None,
            banned_at: None,
            deleted_at: None,
        }
    }

    /// Ban fields are kept so a restore can be audited against them
    pub fn deleted(user: &User, at: DateTime<Utc>) -> Self {
        Self {
            status: UserStatus::Deleted,
            ban_reason: user.ban_reason.clone(),
            banned_at: user.banned_at,
            deleted_at: Some(at),
        }
    }
}

/// Apply `change` if the row is still in `expected` status
///
/// Returns false when no row matched, i.e. a concurrent change won.
pub async fn update_status<'e, E>(
    executor: E,
    id: Uuid,
    expected: UserStatus,
    change: &StatusChange,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET status = ?, ban_reason = ?, banned_at = ?, deleted_at = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(change.status.as_str())
    .bind(change.ban_reason.as_deref())
    .bind(change.banned_at.as_ref().map(format_timestamp))
    .bind(change.deleted_at.as_ref().map(format_timestamp))
    .bind(format_timestamp(&Utc::now()))
    .bind(id.to_string())
    .bind(expected.as_str())
    .execute(executor)
    .await
    .context("Failed to update user status")?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_activity<'e, E>(executor: E, id: Uuid) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM user_activity_log WHERE user_id = ?")
        .bind(id.to_string())
        .execute(executor)
        .await
        .context("Failed to delete user activity")?;
    Ok(result.rows_affected())
}

pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id.to_string())
        .execute(executor)
        .await
        .context("Failed to delete user")?;
    Ok(result.rows_affected() == 1)
}

pub async fn touch_last_login<'e, E>(executor: E, id: Uuid) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(format_timestamp(&Utc::now()))
        .bind(id.to_string())
        .execute(executor)
        .await
        .context("Failed to update last login")?;
    Ok(())
}

pub async fn list<'e, E>(executor: E, query: &UserListQuery) -> Result<Vec<User>>
where
    E: SqliteExecutor<'e>,
{
    let mut sql = format!("SELECT {} FROM users WHERE 1 = 1", USER_COLUMNS);
    if query.role.is_some() {
        sql.push_str(" AND role = ?");
    }
    if query.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));
    if search.is_some() {
        sql.push_str(" AND (username LIKE ? OR email LIKE ? OR full_name LIKE ?)");
    }
    sql.push_str(" ORDER BY created_at DESC, username ASC LIMIT ? OFFSET ?");

    let mut q = sqlx::query_as::<_, UserRow>(&sql);
    if let Some(role) = query.role {
        q = q.bind(role.as_str());
    }
    if let Some(status) = query.status {
        q = q.bind(status.as_str());
    }
    if let Some(ref pattern) = search {
        q = q.bind(pattern).bind(pattern).bind(pattern);
    }
    q = q.bind(query.limit.unwrap_or(50).min(500) as i64);
    q = q.bind(query.offset.unwrap_or(0) as i64);

    let rows = q.fetch_all(executor).await.context("Failed to list users")?;
    Ok(rows.into_iter().map(row_to_user).collect())
}

pub async fn count_admins<'e, E>(executor: E) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin' AND status = 'active'")
        .fetch_one(executor)
        .await
        .context("Failed to count admins")
}
