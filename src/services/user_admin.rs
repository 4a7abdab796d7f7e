//! Account lifecycle administration
//!
//! Every state change runs in its own transaction and is rolled back on any
//! error. Audit logging and the notification email happen after commit and
//! cannot fail the operation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::{Sqlite, Transaction};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::user_repository::{self, StatusChange};
use crate::db::DbPool;
use crate::models::{
    Actor, AuditAction, CreateUserRequest, LifecycleOutcome, RequestContext, User,
    UserListQuery, UserRole, UserStatus,
};
use crate::services::audit::{ActionRecord, AuditLogger};
use crate::services::auth::AuthService;
use crate::services::email::templates::AccountNotice;
use crate::services::email::{notify, Mailer};
use crate::utils::validation::{validate_password, validate_username};
use crate::utils::{AppError, AppResult};

/// Decides the transition for the current row: the status it must still be
/// in at update time, and the change to apply
type Plan<'p> = Box<dyn FnOnce(&User) -> AppResult<(UserStatus, StatusChange)> + Send + 'p>;

pub struct UserAdminService {
    pool: DbPool,
    audit: AuditLogger,
    mailer: Arc<dyn Mailer>,
    public_url: String,
    password_min_length: usize,
}

impl UserAdminService {
    pub fn new(
        pool: DbPool,
        audit: AuditLogger,
        mailer: Arc<dyn Mailer>,
        public_url: impl Into<String>,
        password_min_length: usize,
    ) -> Self {
        Self {
            pool,
            audit,
            mailer,
            public_url: public_url.into(),
            password_min_length,
        }
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        user_repository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))
    }

    pub async fn list_users(&self, query: &UserListQuery) -> AppResult<Vec<User>> {
        Ok(user_repository::list(&self.pool, query).await?)
    }

    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        admin: &Actor,
        req: CreateUserRequest,
    ) -> AppResult<LifecycleOutcome> {
        let send_welcome = req.notify.unwrap_or(true);
        let result = self.insert_user(req).await;
        let context = result
            .as_ref()
            .ok()
            .map(|u| json!({ "role": u.role.as_str(), "email": u.email }));
        let target = result.as_ref().map(|u| u.id).unwrap_or_else(|_| Uuid::nil());

        self.complete(
            ctx,
            admin,
            AuditAction::UserCreate,
            target,
            result,
            send_welcome.then_some(AccountNotice::AccountCreated),
            context,
        )
        .await
    }

    async fn insert_user(&self, req: CreateUserRequest) -> AppResult<User> {
        req.validate()?;

        let username = req.username.trim().to_string();
        if !validate_username(&username) {
            return Err(AppError::ValidationError(
                "Username must start with a letter and contain only letters, digits, '.', '-' or '_'"
                    .to_string(),
            ));
        }
        if !validate_password(&req.password, self.password_min_length) {
            return Err(AppError::ValidationError(format!(
                "Password must be at least {} characters and contain a letter and a digit",
                self.password_min_length
            )));
        }

        let password_hash = AuthService::hash_password(&req.password)?;
        let user = User::new(
            username,
            req.email.trim().to_lowercase(),
            req.full_name.trim().to_string(),
            password_hash,
            req.role,
        );

        let mut tx = self.begin().await?;
        let result = match user_repository::insert(&mut *tx, &user).await {
            Ok(()) => Ok(user),
            Err(e)
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false) =>
            {
                Err(AppError::conflict("Username or email already in use"))
            }
            Err(e) => Err(AppError::from(e)),
        };
        finish(tx, result).await
    }

    pub async fn ban_user(
        &self,
        ctx: &RequestContext,
        admin: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> AppResult<LifecycleOutcome> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let change_reason = reason.clone();

        let result = self
            .transition(
                id,
                Box::new(move |user: &User| {
                    forbid_self(admin, user, "ban")?;
                    match user.status {
                        UserStatus::Active => Ok((
                            UserStatus::Active,
                            StatusChange::banned(change_reason, Utc::now()),
                        )),
                        UserStatus::Banned => Err(AppError::conflict("User is already banned")),
                        UserStatus::Deleted => {
                            Err(AppError::conflict("Deleted accounts cannot be banned"))
                        }
                    }
                }),
                true,
            )
            .await;

        self.complete(
            ctx,
            admin,
            AuditAction::UserBan,
            id,
            result,
            Some(AccountNotice::AccountBanned {
                reason: reason.clone(),
            }),
            Some(json!({ "reason": reason })),
        )
        .await
    }

    pub async fn unban_user(
        &self,
        ctx: &RequestContext,
        admin: &Actor,
        id: Uuid,
    ) -> AppResult<LifecycleOutcome> {
        let result = self
            .transition(
                id,
                Box::new(|user: &User| match user.status {
                    UserStatus::Banned => Ok((UserStatus::Banned, StatusChange::active())),
                    UserStatus::Active => Err(AppError::conflict("User is not banned")),
                    UserStatus::Deleted => {
                        Err(AppError::conflict("Deleted accounts must be restored, not unbanned"))
                    }
                }),
                false,
            )
            .await;

        self.complete(
            ctx,
            admin,
            AuditAction::UserUnban,
            id,
            result,
            Some(AccountNotice::AccountUnbanned),
            None,
        )
        .await
    }

    pub async fn soft_delete_user(
        &self,
        ctx: &RequestContext,
        admin: &Actor,
        id: Uuid,
    ) -> AppResult<LifecycleOutcome> {
        let result = self
            .transition(
                id,
                Box::new(move |user: &User| {
                    forbid_self(admin, user, "delete")?;
                    match user.status {
                        UserStatus::Active | UserStatus::Banned => {
                            Ok((user.status, StatusChange::deleted(user, Utc::now())))
                        }
                        UserStatus::Deleted => Err(AppError::conflict("User is already deleted")),
                    }
                }),
                true,
            )
            .await;

        self.complete(
            ctx,
            admin,
            AuditAction::UserDelete,
            id,
            result,
            Some(AccountNotice::AccountDeleted),
            None,
        )
        .await
    }

    pub async fn restore_user(
        &self,
        ctx: &RequestContext,
        admin: &Actor,
        id: Uuid,
    ) -> AppResult<LifecycleOutcome> {
        let result = self
            .transition(
                id,
                Box::new(|user: &User| match user.status {
                    UserStatus::Deleted => Ok((UserStatus::Deleted, StatusChange::active())),
                    _ => Err(AppError::conflict("Only deleted accounts can be restored")),
                }),
                false,
            )
            .await;

        self.complete(
            ctx,
            admin,
            AuditAction::UserRestore,
            id,
            result,
            Some(AccountNotice::AccountRestored),
            None,
        )
        .await
    }

    /// Remove the account row and its activity history
    ///
    /// The returned user is the row as it was before deletion; the
    /// notification goes to that captured address.
    pub async fn permanently_delete_user(
        &self,
        ctx: &RequestContext,
        admin: &Actor,
        id: Uuid,
    ) -> AppResult<LifecycleOutcome> {
        let result = self.purge(admin, id).await;
        let context = result.as_ref().ok().map(|u| json!({ "previous_status": u.status.as_str() }));

        self.complete(
            ctx,
            admin,
            AuditAction::UserPurge,
            id,
            result,
            Some(AccountNotice::AccountPurged),
            context,
        )
        .await
    }

    async fn purge(&self, admin: &Actor, id: Uuid) -> AppResult<User> {
        let mut tx = self.begin().await?;
        let result = purge_in_tx(&mut tx, admin, id).await;
        finish(tx, result).await
    }

    async fn transition(&self, id: Uuid, plan: Plan<'_>, guard_last_admin: bool) -> AppResult<User> {
        let mut tx = self.begin().await?;
        let result = transition_in_tx(&mut tx, id, plan, guard_last_admin).await;
        finish(tx, result).await
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            AppError::Database("Failed to begin transaction".to_string())
        })
    }

    /// Audit the result, then send the notification if the change committed
    #[allow(clippy::too_many_arguments)]
    async fn complete(
        &self,
        ctx: &RequestContext,
        admin: &Actor,
        action: AuditAction,
        target: Uuid,
        result: AppResult<User>,
        notice: Option<AccountNotice>,
        context: Option<serde_json::Value>,
    ) -> AppResult<LifecycleOutcome> {
        match result {
            Ok(user) => {
                let mut record =
                    ActionRecord::new(action, "user").resource(user.id, user.username.clone());
                if let Some(context) = context {
                    record = record.context(context);
                }
                self.audit.log_action(ctx, admin, record).await;

                let email_sent = match notice {
                    Some(notice) => {
                        notify(self.mailer.as_ref(), &notice, &user, &self.public_url).await
                    }
                    None => false,
                };

                info!(
                    admin = %admin.username,
                    action = action.as_str(),
                    user_id = %user.id,
                    status = user.status.as_str(),
                    email_sent = email_sent,
                    "Account lifecycle change"
                );
                Ok(LifecycleOutcome { user, email_sent })
            }
            Err(e) => {
                let mut record = ActionRecord::new(action, "user");
                if !target.is_nil() {
                    record.resource_id = Some(target.to_string());
                }
                self.audit
                    .log_action(ctx, admin, record.failed(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }
}

fn forbid_self(admin: &Actor, user: &User, verb: &str) -> AppResult<()> {
    if admin.user_id == Some(user.id) {
        return Err(AppError::forbidden(format!("You cannot {} your own account", verb)));
    }
    Ok(())
}

async fn load_for_update(tx: &mut Transaction<'_, Sqlite>, id: Uuid) -> AppResult<User> {
    user_repository::find_by_id(&mut **tx, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))
}

/// The last active admin can be neither banned nor deleted
async fn ensure_not_last_admin(tx: &mut Transaction<'_, Sqlite>, user: &User) -> AppResult<()> {
    if user.role == UserRole::Admin
        && user.status == UserStatus::Active
        && user_repository::count_admins(&mut **tx).await? <= 1
    {
        return Err(AppError::conflict("Cannot remove the last active administrator"));
    }
    Ok(())
}

async fn transition_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
    plan: Plan<'_>,
    guard_last_admin: bool,
) -> AppResult<User> {
    let user = load_for_update(tx, id).await?;
    let (expected, change) = plan(&user)?;
    if guard_last_admin {
        ensure_not_last_admin(tx, &user).await?;
    }

    if !user_repository::update_status(&mut **tx, id, expected, &change).await? {
        return Err(AppError::conflict("User was modified by another request"));
    }

    load_for_update(tx, id).await
}

async fn purge_in_tx(tx: &mut Transaction<'_, Sqlite>, admin: &Actor, id: Uuid) -> AppResult<User> {
    let user = load_for_update(tx, id).await?;
    forbid_self(admin, &user, "delete")?;
    ensure_not_last_admin(tx, &user).await?;

    user_repository::delete_activity(&mut **tx, id).await?;
    if !user_repository::delete(&mut **tx, id).await? {
        return Err(AppError::not_found(format!("User {} not found", id)));
    }
    Ok(user)
}

/// Commit on success, roll back on error
async fn finish<T>(tx: Transaction<'_, Sqlite>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                error!("Failed to commit transaction: {}", e);
                AppError::Database("Failed to commit transaction".to_string())
            })?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Transaction rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}
