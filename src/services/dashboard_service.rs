//! Dashboard aggregation scoped to the caller's role.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{DashboardSummary, ExpenseOwnerFilter, StatusTotals, User, UserRole};
use crate::errors::{AppResult, OptionExt};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait DashboardService: Send + Sync {
    async fn summary(&self, actor: &User) -> AppResult<DashboardSummary>;
}

pub struct DashboardBuilder<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> DashboardBuilder<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    async fn totals(&self, actor: &User, owner: ExpenseOwnerFilter) -> AppResult<StatusTotals> {
        let expenses = self.uow.expenses().all_for(actor.company_id, owner).await?;
        Ok(StatusTotals::tally(&expenses))
    }
}

#[async_trait]
impl<U: UnitOfWork> DashboardService for DashboardBuilder<U> {
    async fn summary(&self, actor: &User) -> AppResult<DashboardSummary> {
        let company = self
            .uow
            .companies()
            .find_by_id(actor.company_id)
            .await?
            .ok_or_not_found()?;

        let expenses = self.uow.expenses();
        let (mine, awaiting_my_approval) = tokio::try_join!(
            self.totals(actor, ExpenseOwnerFilter::Employee(actor.id)),
            expenses.count_pending_for(actor.id),
        )?;

        let (team, company_totals) = match actor.role {
            UserRole::Admin => {
                let all = self.totals(actor, ExpenseOwnerFilter::Company).await?;
                (Some(all.clone()), Some(all))
            }
            UserRole::Manager => {
                let team = self
                    .totals(actor, ExpenseOwnerFilter::ManagedBy(actor.id))
                    .await?;
                (Some(team), None)
            }
            UserRole::Employee => (None, None),
        };

        Ok(DashboardSummary {
            currency: company.currency,
            mine,
            awaiting_my_approval,
            team,
            company: company_totals,
        })
    }
}
