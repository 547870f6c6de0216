//! User service: administration of a company's people and reporting lines.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::auth_service::normalize_email;
use super::Notifier;
use crate::domain::user::creates_reporting_cycle;
use crate::domain::{NewUser, Password, User, UserChanges, UserRole};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;
use crate::types::PaginationParams;

/// Person created by an admin
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub manager_id: Option<Uuid>,
}

/// User service trait for dependency injection.
///
/// Every operation acts on behalf of `actor` and never crosses company lines.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create a user in the actor's company (admins only)
    async fn create_user(&self, actor: &User, member: NewMember) -> AppResult<User>;

    /// Admins see the company, managers their direct reports
    async fn list_users(
        &self,
        actor: &User,
        include_deleted: bool,
        params: PaginationParams,
    ) -> AppResult<(Vec<User>, u64)>;

    /// Self, an admin, or the user's manager
    async fn get_user(&self, actor: &User, id: Uuid) -> AppResult<User>;

    async fn update_user(&self, actor: &User, id: Uuid, changes: UserChanges) -> AppResult<User>;

    /// Soft delete (admins only, never oneself)
    async fn delete_user(&self, actor: &User, id: Uuid) -> AppResult<()>;

    async fn restore_user(&self, actor: &User, id: Uuid) -> AppResult<User>;
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
    notifier: Notifier,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>, notifier: Notifier) -> Self {
        Self { uow, notifier }
    }

    /// Load a user of the actor's company; other tenants look like missing rows.
    async fn colleague(&self, actor: &User, id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id_with_deleted(id)
            .await?
            .filter(|user| user.company_id == actor.company_id)
            .ok_or_not_found()
    }

    /// Refuse to remove an approver that rules or undecided expenses still depend on.
    async fn ensure_not_approving(&self, id: Uuid, action: &str) -> AppResult<()> {
        if self.uow.rules().count_with_approver(id).await? > 0 {
            return Err(AppError::BadRequest(format!(
                "Remove this user from approval rules before {}",
                action
            )));
        }
        if self.uow.expenses().count_open_for(id).await? > 0 {
            return Err(AppError::BadRequest(format!(
                "Settle the expenses awaiting this user's decision before {}",
                action
            )));
        }

        Ok(())
    }

    /// Check that `manager_id` may manage `user_id` (None for a user not yet created).
    async fn validate_manager(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        manager_id: Uuid,
    ) -> AppResult<()> {
        if user_id == Some(manager_id) {
            return Err(AppError::validation("A user cannot be their own manager"));
        }

        let manager = self
            .uow
            .users()
            .find_by_id(manager_id)
            .await?
            .filter(|m| m.company_id == company_id)
            .ok_or_else(|| AppError::validation("Manager not found in this company"))?;

        if !manager.role.can_approve() {
            return Err(AppError::validation("Manager must have the manager or admin role"));
        }

        if let Some(user_id) = user_id {
            let managers: HashMap<Uuid, Uuid> = self
                .uow
                .users()
                .all_in_company(company_id)
                .await?
                .into_iter()
                .filter_map(|u| u.manager_id.map(|m| (u.id, m)))
                .collect();

            if creates_reporting_cycle(user_id, manager_id, |id| managers.get(&id).copied()) {
                return Err(AppError::validation("Manager assignment would create a reporting cycle"));
            }
        }

        Ok(())
    }
}

fn require_admin(actor: &User) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn create_user(&self, actor: &User, member: NewMember) -> AppResult<User> {
        require_admin(actor)?;

        let email = normalize_email(&member.email);
        if self.uow.users().find_by_email_with_deleted(&email).await?.is_some() {
            return Err(AppError::conflict("User"));
        }

        if let Some(manager_id) = member.manager_id {
            self.validate_manager(actor.company_id, None, manager_id).await?;
        }

        let password_hash = Password::new(&member.password)?.into_string();
        let user = self
            .uow
            .users()
            .create(NewUser {
                company_id: actor.company_id,
                email,
                password_hash,
                name: member.name.trim().to_string(),
                role: member.role,
                manager_id: member.manager_id,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, created_by = %actor.id, "User created");

        if let Some(company) = self.uow.companies().find_by_id(actor.company_id).await? {
            self.notifier.welcome(&user, &company.name).await;
        }

        Ok(user)
    }

    async fn list_users(
        &self,
        actor: &User,
        include_deleted: bool,
        params: PaginationParams,
    ) -> AppResult<(Vec<User>, u64)> {
        match actor.role {
            UserRole::Admin => {
                self.uow
                    .users()
                    .list_by_company(actor.company_id, include_deleted, params)
                    .await
            }
            UserRole::Manager => self.uow.users().list_reports(actor.id, params).await,
            UserRole::Employee => Err(AppError::Forbidden),
        }
    }

    async fn get_user(&self, actor: &User, id: Uuid) -> AppResult<User> {
        if id == actor.id {
            return Ok(actor.clone());
        }

        let user = self.colleague(actor, id).await?;
        if actor.is_admin() {
            return Ok(user);
        }

        if user.is_deleted() {
            return Err(AppError::NotFound);
        }
        if actor.manages(&user) {
            return Ok(user);
        }

        Err(AppError::Forbidden)
    }

    async fn update_user(&self, actor: &User, id: Uuid, changes: UserChanges) -> AppResult<User> {
        require_admin(actor)?;

        let user = self.colleague(actor, id).await?;
        if user.is_deleted() {
            return Err(AppError::NotFound);
        }

        if let Some(role) = changes.role {
            if id == actor.id && role != user.role {
                return Err(AppError::BadRequest(
                    "Admins cannot change their own role".to_string(),
                ));
            }

            if !role.can_approve() && user.role.can_approve() {
                if self.uow.users().count_active_reports(id).await? > 0 {
                    return Err(AppError::BadRequest(
                        "Reassign this user's direct reports before making them an employee"
                            .to_string(),
                    ));
                }
                self.ensure_not_approving(id, "making them an employee")
                    .await?;
            }
        }

        if let Some(Some(manager_id)) = changes.manager_id {
            self.validate_manager(actor.company_id, Some(id), manager_id)
                .await?;
        }

        let changes = UserChanges {
            name: changes.name.map(|n| n.trim().to_string()),
            ..changes
        };

        let updated = self.uow.users().update(id, changes).await?;
        tracing::info!(user_id = %id, updated_by = %actor.id, "User updated");

        Ok(updated)
    }

    async fn delete_user(&self, actor: &User, id: Uuid) -> AppResult<()> {
        require_admin(actor)?;

        if id == actor.id {
            return Err(AppError::BadRequest(
                "You cannot delete your own account".to_string(),
            ));
        }

        let user = self.colleague(actor, id).await?;
        if user.is_deleted() {
            return Err(AppError::NotFound);
        }
        if user.role.can_approve() {
            self.ensure_not_approving(id, "deactivating them").await?;
        }

        self.uow.users().delete(id).await?;
        tracing::info!(user_id = %id, deleted_by = %actor.id, "User deactivated");

        Ok(())
    }

    async fn restore_user(&self, actor: &User, id: Uuid) -> AppResult<User> {
        require_admin(actor)?;

        let user = self.colleague(actor, id).await?;
        if user.is_active() {
            return Err(AppError::invalid_state("User is not deactivated"));
        }

        let restored = self.uow.users().restore(id).await?;
        tracing::info!(user_id = %id, restored_by = %actor.id, "User restored");

        Ok(restored)
    }
}
