//! Company service. The reporting currency is fixed at signup because stored
//! converted amounts depend on it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{Company, User};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait CompanyService: Send + Sync {
    async fn get_company(&self, actor: &User) -> AppResult<Company>;

    /// Rename or relocate the company (admins only)
    async fn update_company(
        &self,
        actor: &User,
        name: Option<String>,
        country: Option<String>,
    ) -> AppResult<Company>;
}

pub struct CompanyManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> CompanyManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> CompanyService for CompanyManager<U> {
    async fn get_company(&self, actor: &User) -> AppResult<Company> {
        self.uow
            .companies()
            .find_by_id(actor.company_id)
            .await?
            .ok_or_not_found()
    }

    async fn update_company(
        &self,
        actor: &User,
        name: Option<String>,
        country: Option<String>,
    ) -> AppResult<Company> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let company = self
            .uow
            .companies()
            .update(
                actor.company_id,
                name.map(|n| n.trim().to_string()),
                country.map(|c| c.trim().to_string()),
            )
            .await?;

        tracing::info!(company_id = %company.id, updated_by = %actor.id, "Company updated");
        Ok(company)
    }
}
