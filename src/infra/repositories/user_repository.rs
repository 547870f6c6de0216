//! User repository with soft delete support.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::base::fetch_page;
use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::{NewUser, User, UserChanges};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
///
/// Query methods exclude soft-deleted users unless named `*_with_deleted`.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find active user by e-mail (stored lower-case)
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>>;

    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Apply changes to an active user
    async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<User>;

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()>;

    /// Soft delete (sets deleted_at)
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Clear deleted_at on a soft-deleted user
    async fn restore(&self, id: Uuid) -> AppResult<User>;

    /// One page of a company's users, ordered by name
    async fn list_by_company(
        &self,
        company_id: Uuid,
        include_deleted: bool,
        params: PaginationParams,
    ) -> AppResult<(Vec<User>, u64)>;

    /// One page of a manager's active direct reports
    async fn list_reports(
        &self,
        manager_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<(Vec<User>, u64)>;

    async fn count_active_reports(&self, manager_id: Uuid) -> AppResult<u64>;

    /// Every user of a company, deleted ones included
    async fn all_in_company(&self, company_id: Uuid) -> AppResult<Vec<User>>;
}

/// Concrete implementation of UserRepository
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        find_by_id(&self.db, id).await
    }

    async fn find_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .filter(user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(result.map(User::from))
    }

    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>> {
        find_by_email_with_deleted(&self.db, email).await
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        create(&self.db, new_user).await
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        let model = find_active_model(&self.db, id).await?;
        let mut active: ActiveModel = model.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(role) = changes.role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(manager_id) = changes.manager_id {
            active.manager_id = Set(manager_id);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(User::from(model))
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        update_password(&self.db, id, password_hash).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let model = find_active_model(&self.db, id).await?;

        let mut active: ActiveModel = model.into();
        let now = Utc::now();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);

        active.update(&self.db).await?;
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> AppResult<User> {
        let model = UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_not_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::validation("User is not deleted or does not exist"))?;

        let mut active: ActiveModel = model.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(User::from(model))
    }

    async fn list_by_company(
        &self,
        company_id: Uuid,
        include_deleted: bool,
        params: PaginationParams,
    ) -> AppResult<(Vec<User>, u64)> {
        let mut select = UserEntity::find().filter(user::Column::CompanyId.eq(company_id));
        if !include_deleted {
            select = select.filter(user::Column::DeletedAt.is_null());
        }
        let select = select
            .order_by_asc(user::Column::Name)
            .order_by_asc(user::Column::Id);

        let (models, total) = fetch_page(select, &self.db, &params).await?;
        Ok((models.into_iter().map(User::from).collect(), total))
    }

    async fn list_reports(
        &self,
        manager_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<(Vec<User>, u64)> {
        let select = UserEntity::find()
            .filter(user::Column::ManagerId.eq(manager_id))
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::Name)
            .order_by_asc(user::Column::Id);

        let (models, total) = fetch_page(select, &self.db, &params).await?;
        Ok((models.into_iter().map(User::from).collect(), total))
    }

    async fn count_active_reports(&self, manager_id: Uuid) -> AppResult<u64> {
        let count = UserEntity::find()
            .filter(user::Column::ManagerId.eq(manager_id))
            .filter(user::Column::DeletedAt.is_null())
            .count(&self.db)
            .await?;

        Ok(count)
    }

    async fn all_in_company(&self, company_id: Uuid) -> AppResult<Vec<User>> {
        let models = UserEntity::find()
            .filter(user::Column::CompanyId.eq(company_id))
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(User::from).collect())
    }
}

// -----------------------------------------------------------------------------
// Queries shared with the transaction-bound repository
// -----------------------------------------------------------------------------

pub(crate) async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<User>> {
    let result = UserEntity::find_by_id(id)
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await?;

    Ok(result.map(User::from))
}

pub(crate) async fn find_by_email_with_deleted<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> AppResult<Option<User>> {
    let result = UserEntity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?;

    Ok(result.map(User::from))
}

pub(crate) async fn create<C: ConnectionTrait>(db: &C, new_user: NewUser) -> AppResult<User> {
    let now = Utc::now();
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(new_user.company_id),
        email: Set(new_user.email),
        password_hash: Set(new_user.password_hash),
        name: Set(new_user.name),
        role: Set(new_user.role.as_str().to_string()),
        manager_id: Set(new_user.manager_id),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    };

    let model = active_model.insert(db).await?;
    Ok(User::from(model))
}

pub(crate) async fn update_password<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    password_hash: String,
) -> AppResult<()> {
    let model = find_active_model(db, id).await?;

    let mut active: ActiveModel = model.into();
    active.password_hash = Set(password_hash);
    active.updated_at = Set(Utc::now());

    active.update(db).await?;
    Ok(())
}

async fn find_active_model<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<user::Model> {
    UserEntity::find_by_id(id)
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or(AppError::NotFound)
}

