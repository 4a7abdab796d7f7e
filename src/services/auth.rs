//! Authentication service
//!
//! Password hashing with Argon2id and credential checks against `users`.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::user_repository;
use crate::models::{User, UserStatus};

/// Result of checking a username/password pair
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Success(User),
    UnknownUser,
    InvalidPassword(User),
    Banned(User),
    Deleted(User),
}

impl AuthOutcome {
    /// Reason recorded in `login_logs`; never shown to the client
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            AuthOutcome::Success(_) => None,
            AuthOutcome::UnknownUser => Some("unknown_user"),
            AuthOutcome::InvalidPassword(_) => Some("invalid_password"),
            AuthOutcome::Banned(_) => Some("account_banned"),
            AuthOutcome::Deleted(_) => Some("account_deleted"),
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthOutcome::UnknownUser => None,
            AuthOutcome::Success(u)
            | AuthOutcome::InvalidPassword(u)
            | AuthOutcome::Banned(u)
            | AuthOutcome::Deleted(u) => Some(u),
        }
    }
}

pub struct AuthService {
    pool: SqlitePool,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Check credentials; `login` may be a username or an email address
    ///
    /// Banned and deleted accounts are reported only after the password
    /// matches, so their status is not disclosed to a guesser.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<AuthOutcome> {
        let Some(user) = user_repository::find_by_login(&self.pool, login.trim()).await? else {
            return Ok(AuthOutcome::UnknownUser);
        };

        if !Self::verify_password(password, &user.password_hash)
            .context("Stored password hash is unreadable")?
        {
            return Ok(AuthOutcome::InvalidPassword(user));
        }

        Ok(match user.status {
            UserStatus::Active => {
                if let Err(e) = user_repository::touch_last_login(&self.pool, user.id).await {
                    warn!(user_id = %user.id, "Failed to record last login: {:#}", e);
                }
                AuthOutcome::Success(user)
            }
            UserStatus::Banned => AuthOutcome::Banned(user),
            UserStatus::Deleted => AuthOutcome::Deleted(user),
        })
    }
}
