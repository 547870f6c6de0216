//! Company repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use super::entities::company::{ActiveModel, Entity as CompanyEntity};
use crate::domain::{Company, NewCompany};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Company>>;

    /// Rename or relocate a company. The currency never changes.
    async fn update(&self, id: Uuid, name: Option<String>, country: Option<String>) -> AppResult<Company>;
}

/// Concrete implementation of CompanyRepository
pub struct CompanyStore {
    db: DatabaseConnection,
}

impl CompanyStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CompanyRepository for CompanyStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Company>> {
        find_by_id(&self.db, id).await
    }

    async fn update(&self, id: Uuid, name: Option<String>, country: Option<String>) -> AppResult<Company> {
        let model = CompanyEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(country) = country {
            active.country = Set(country);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Company::from(model))
    }
}

pub(crate) async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<Company>> {
    let result = CompanyEntity::find_by_id(id).one(db).await?;
    Ok(result.map(Company::from))
}

pub(crate) async fn create<C: ConnectionTrait>(db: &C, company: NewCompany) -> AppResult<Company> {
    let now = Utc::now();
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(company.name),
        country: Set(company.country),
        currency: Set(company.currency),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = active_model.insert(db).await?;
    Ok(Company::from(model))
}
