//! Approval rule administration.
//!
//! Expenses keep a snapshot of the condition they were submitted under, so
//! editing or deleting a rule never changes a chain already in flight.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ApprovalRule, RuleDefinition, User};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait RuleService: Send + Sync {
    async fn list_rules(&self, actor: &User) -> AppResult<Vec<ApprovalRule>>;

    async fn get_rule(&self, actor: &User, id: Uuid) -> AppResult<ApprovalRule>;

    async fn create_rule(&self, actor: &User, definition: RuleDefinition) -> AppResult<ApprovalRule>;

    /// Replace a rule's contents, approvers included
    async fn update_rule(&self, actor: &User, id: Uuid, definition: RuleDefinition) -> AppResult<ApprovalRule>;

    async fn delete_rule(&self, actor: &User, id: Uuid) -> AppResult<()>;
}

pub struct RuleManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> RuleManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    /// Structural checks plus the ones that need the company's people.
    async fn validate(&self, company_id: Uuid, definition: RuleDefinition) -> AppResult<RuleDefinition> {
        let definition = RuleDefinition {
            name: definition.name.trim().to_string(),
            description: definition
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            category: definition.category.map(|c| c.trim().to_string()),
            ..definition
        };
        definition.validate()?;

        let users = self.uow.users();

        if let Some(user_id) = definition.user_id {
            users
                .find_by_id(user_id)
                .await?
                .filter(|u| u.company_id == company_id)
                .ok_or_else(|| AppError::validation("The rule's employee is not in this company"))?;
        }

        for approver in &definition.approvers {
            let user = users
                .find_by_id(approver.user_id)
                .await?
                .filter(|u| u.company_id == company_id)
                .ok_or_else(|| {
                    AppError::validation(format!("Approver {} is not in this company", approver.user_id))
                })?;

            if !user.role.can_approve() {
                return Err(AppError::validation(format!(
                    "{} cannot approve expenses: approvers must be managers or admins",
                    user.name
                )));
            }
        }

        Ok(definition)
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
impl<U: UnitOfWork> RuleService for RuleManager<U> {
    async fn list_rules(&self, actor: &User) -> AppResult<Vec<ApprovalRule>> {
        require_admin(actor)?;
        self.uow.rules().list(actor.company_id).await
    }

    async fn get_rule(&self, actor: &User, id: Uuid) -> AppResult<ApprovalRule> {
        require_admin(actor)?;
        self.uow
            .rules()
            .find_by_id(id)
            .await?
            .filter(|r| r.company_id == actor.company_id)
            .ok_or_not_found()
    }

    async fn create_rule(&self, actor: &User, definition: RuleDefinition) -> AppResult<ApprovalRule> {
        require_admin(actor)?;

        let company_id = actor.company_id;
        let definition = self.validate(company_id, definition).await?;

        let rule = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move { ctx.rules().create(company_id, definition).await })
            })
            .await?;

        tracing::info!(rule_id = %rule.id, created_by = %actor.id, "Approval rule created");
        Ok(rule)
    }

    async fn update_rule(&self, actor: &User, id: Uuid, definition: RuleDefinition) -> AppResult<ApprovalRule> {
        let existing = self.get_rule(actor, id).await?;
        let definition = self.validate(existing.company_id, definition).await?;

        let rule = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move { ctx.rules().update(id, definition).await })
            })
            .await?;

        tracing::info!(rule_id = %id, updated_by = %actor.id, "Approval rule updated");
        Ok(rule)
    }

    async fn delete_rule(&self, actor: &User, id: Uuid) -> AppResult<()> {
        self.get_rule(actor, id).await?;

        self.uow
            .transaction(move |ctx| Box::pin(async move { ctx.rules().delete(id).await }))
            .await?;

        tracing::info!(rule_id = %id, deleted_by = %actor.id, "Approval rule deleted");
        Ok(())
    }
}
