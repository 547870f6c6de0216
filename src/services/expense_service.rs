//! Expense service: drafts, submission and the approval workflow.
//!
//! The approval engine in `domain::approval` is pure; this service loads a
//! chain under a row lock, lets the engine decide, and persists the result in
//! the same transaction. Notifications go out after the commit.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::Notifier;
use crate::config::MONEY_SCALE;
use crate::domain::approval::{
    build_chain, decide, override_chain, select_rule, start, ChainPolicy, Decision, Outcome,
};
use crate::domain::currency::{max_money, normalize_code};
use crate::domain::{
    ApprovalStep, CurrencyConverter, Expense, ExpenseChanges, ExpenseOwnerFilter, ExpenseResponse,
    ExpenseScope, ExpenseStatus, NewExpense, User, UserRole,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{Submission, UnitOfWork};
use crate::types::PaginationParams;

/// Contents of a new draft
#[derive(Debug, Clone)]
pub struct ExpenseDraft {
    pub description: String,
    pub category: String,
    pub amount: Decimal,
    pub currency: String,
    pub expense_date: NaiveDate,
    pub paid_by: Option<String>,
    pub remarks: Option<String>,
}

/// Partial update of a draft. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct DraftChanges {
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub expense_date: Option<NaiveDate>,
    pub paid_by: Option<Option<String>>,
    pub remarks: Option<Option<String>>,
}

#[async_trait]
pub trait ExpenseService: Send + Sync {
    async fn create_expense(&self, actor: &User, draft: ExpenseDraft) -> AppResult<ExpenseResponse>;

    /// Owner only, drafts only
    async fn update_expense(&self, actor: &User, id: Uuid, changes: DraftChanges) -> AppResult<ExpenseResponse>;

    /// Owner only, drafts only
    async fn delete_expense(&self, actor: &User, id: Uuid) -> AppResult<()>;

    /// Build the approval chain and start the workflow
    async fn submit_expense(&self, actor: &User, id: Uuid) -> AppResult<ExpenseResponse>;

    async fn get_expense(&self, actor: &User, id: Uuid) -> AppResult<ExpenseResponse>;

    async fn list_expenses(
        &self,
        actor: &User,
        scope: ExpenseScope,
        status: Option<ExpenseStatus>,
        params: PaginationParams,
    ) -> AppResult<(Vec<ExpenseResponse>, u64)>;

    /// Expenses waiting for the actor's decision
    async fn pending_approvals(&self, actor: &User) -> AppResult<Vec<ExpenseResponse>>;

    async fn approve(&self, actor: &User, id: Uuid, comment: Option<String>) -> AppResult<ExpenseResponse>;

    /// A rejection needs a comment
    async fn reject(&self, actor: &User, id: Uuid, comment: String) -> AppResult<ExpenseResponse>;

    /// Settle a pending expense regardless of the chain (admins only)
    async fn override_decision(
        &self,
        actor: &User,
        id: Uuid,
        decision: Decision,
        comment: Option<String>,
    ) -> AppResult<ExpenseResponse>;
}

pub struct ExpenseManager<U: UnitOfWork> {
    uow: Arc<U>,
    converter: Arc<CurrencyConverter>,
    notifier: Notifier,
}

/// Chain state after a transactional step of the workflow
struct Progress {
    expense: Expense,
    chain: Vec<ApprovalStep>,
    newly_pending: Vec<Uuid>,
}

fn status_for(outcome: Outcome) -> ExpenseStatus {
    match outcome {
        Outcome::Pending => ExpenseStatus::Pending,
        Outcome::Approved => ExpenseStatus::Approved,
        Outcome::Rejected => ExpenseStatus::Rejected,
    }
}

/// Positive, at most two decimal places, within the column limit.
fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("Amount must be greater than zero"));
    }
    if amount > max_money() {
        return Err(AppError::validation(format!(
            "Amount cannot exceed {}",
            max_money()
        )));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(AppError::validation(format!(
            "Amount cannot have more than {} decimal places",
            MONEY_SCALE
        )));
    }

    Ok(amount)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<U: UnitOfWork> ExpenseManager<U> {
    pub fn new(uow: Arc<U>, converter: Arc<CurrencyConverter>, notifier: Notifier) -> Self {
        Self {
            uow,
            converter,
            notifier,
        }
    }

    async fn company_currency(&self, company_id: Uuid) -> AppResult<String> {
        let company = self
            .uow
            .companies()
            .find_by_id(company_id)
            .await?
            .ok_or_not_found()?;

        Ok(company.currency)
    }

    /// Load an expense of the actor's company owned by the actor.
    async fn owned(&self, actor: &User, id: Uuid) -> AppResult<Expense> {
        let expense = self
            .uow
            .expenses()
            .find_by_id(id)
            .await?
            .filter(|e| e.company_id == actor.company_id)
            .ok_or_not_found()?;

        if !expense.is_owned_by(actor.id) {
            return Err(AppError::Forbidden);
        }

        Ok(expense)
    }

    /// Who may read an expense: its owner, admins, the owner's manager and
    /// anyone on its chain.
    async fn can_view(&self, actor: &User, expense: &Expense, chain: &[ApprovalStep]) -> AppResult<bool> {
        if expense.is_owned_by(actor.id) || actor.is_admin() {
            return Ok(true);
        }
        if chain.iter().any(|s| s.approver_id == actor.id) {
            return Ok(true);
        }

        let owner = self.uow.users().find_by_id_with_deleted(expense.employee_id).await?;
        Ok(owner.is_some_and(|owner| actor.manages(&owner)))
    }

    /// Mail the approvers whose turn just came and, once settled, the owner.
    async fn announce(&self, progress: &Progress) {
        let expense = &progress.expense;
        if progress.newly_pending.is_empty() && !expense.status.is_final() {
            return;
        }

        let users = self.uow.users();
        let owner = match users.find_by_id_with_deleted(expense.employee_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(expense_id = %expense.id, error = %e, "Could not load expense owner");
                return;
            }
        };

        for approver_id in &progress.newly_pending {
            match users.find_by_id(*approver_id).await {
                Ok(Some(approver)) => {
                    self.notifier
                        .approval_requested(&approver, expense, &owner.name)
                        .await
                }
                Ok(None) => tracing::warn!(approver_id = %approver_id, "Pending approver is no longer active"),
                Err(e) => tracing::warn!(approver_id = %approver_id, error = %e, "Could not load approver"),
            }
        }

        if expense.status.is_final() {
            self.notifier.expense_decided(&owner, expense).await;
        }
    }

    async fn record_decision(
        &self,
        actor: &User,
        id: Uuid,
        decision: Decision,
        comment: Option<String>,
    ) -> AppResult<ExpenseResponse> {
        let approver_id = actor.id;
        let company_id = actor.company_id;
        let now = Utc::now();

        let progress = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let expense = ctx
                        .expenses()
                        .find_for_update(id)
                        .await?
                        .filter(|e| e.company_id == company_id)
                        .ok_or_not_found()?;

                    if expense.status != ExpenseStatus::Pending {
                        return Err(AppError::invalid_state("Expense is not awaiting approval"));
                    }

                    let mut chain = ctx.expenses().steps(expense.id).await?;
                    let policy = ChainPolicy::for_chain(expense.condition.unwrap_or_default(), &chain);
                    let resolution = decide(&mut chain, &policy, approver_id, decision, comment, now)?;

                    ctx.expenses().save_steps(&chain).await?;

                    let expense = if resolution.outcome.is_final() {
                        ctx.expenses()
                            .mark_decided(expense.id, status_for(resolution.outcome), now)
                            .await?
                    } else {
                        expense
                    };

                    Ok(Progress {
                        expense,
                        chain,
                        newly_pending: resolution.newly_pending,
                    })
                })
            })
            .await?;

        tracing::info!(
            expense_id = %id,
            approver_id = %approver_id,
            decision = ?decision,
            status = %progress.expense.status,
            "Expense decision recorded"
        );

        self.announce(&progress).await;
        Ok(ExpenseResponse::with_steps(progress.expense, progress.chain))
    }
}

#[async_trait]
impl<U: UnitOfWork> ExpenseService for ExpenseManager<U> {
    async fn create_expense(&self, actor: &User, draft: ExpenseDraft) -> AppResult<ExpenseResponse> {
        let amount = validate_amount(draft.amount)?;
        let currency = normalize_code(&draft.currency);
        let company_currency = self.company_currency(actor.company_id).await?;
        let company_amount = self.converter.convert(amount, &currency, &company_currency)?;

        let expense = self
            .uow
            .expenses()
            .create(NewExpense {
                company_id: actor.company_id,
                employee_id: actor.id,
                description: draft.description.trim().to_string(),
                category: draft.category.trim().to_string(),
                amount,
                currency,
                company_amount,
                expense_date: draft.expense_date,
                paid_by: non_blank(draft.paid_by),
                remarks: non_blank(draft.remarks),
            })
            .await?;

        tracing::debug!(expense_id = %expense.id, employee_id = %actor.id, "Draft expense created");
        Ok(ExpenseResponse::from(expense))
    }

    async fn update_expense(&self, actor: &User, id: Uuid, changes: DraftChanges) -> AppResult<ExpenseResponse> {
        let expense = self.owned(actor, id).await?;
        if !expense.is_draft() {
            return Err(AppError::invalid_state("Only draft expenses can be changed"));
        }

        let money = if changes.amount.is_some() || changes.currency.is_some() {
            let amount = validate_amount(changes.amount.unwrap_or(expense.amount))?;
            let currency = changes
                .currency
                .as_deref()
                .map(normalize_code)
                .unwrap_or_else(|| expense.currency.clone());
            let company_currency = self.company_currency(actor.company_id).await?;
            let company_amount = self.converter.convert(amount, &currency, &company_currency)?;
            Some((amount, currency, company_amount))
        } else {
            None
        };

        let updated = self
            .uow
            .expenses()
            .update_draft(
                id,
                ExpenseChanges {
                    description: changes.description.map(|d| d.trim().to_string()),
                    category: changes.category.map(|c| c.trim().to_string()),
                    money,
                    expense_date: changes.expense_date,
                    paid_by: changes.paid_by.map(non_blank),
                    remarks: changes.remarks.map(non_blank),
                },
            )
            .await?;

        Ok(ExpenseResponse::from(updated))
    }

    async fn delete_expense(&self, actor: &User, id: Uuid) -> AppResult<()> {
        let expense = self.owned(actor, id).await?;
        if !expense.is_draft() {
            return Err(AppError::invalid_state("Only draft expenses can be deleted"));
        }

        self.uow.expenses().delete_draft(id).await?;
        tracing::debug!(expense_id = %id, "Draft expense deleted");
        Ok(())
    }

    async fn submit_expense(&self, actor: &User, id: Uuid) -> AppResult<ExpenseResponse> {
        let submitter = actor.clone();
        let converter = self.converter.clone();
        let now = Utc::now();

        let progress = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let expense = ctx
                        .expenses()
                        .find_for_update(id)
                        .await?
                        .filter(|e| e.company_id == submitter.company_id)
                        .ok_or_not_found()?;

                    if !expense.is_owned_by(submitter.id) {
                        return Err(AppError::Forbidden);
                    }
                    if !expense.is_draft() {
                        return Err(AppError::invalid_state("Only draft expenses can be submitted"));
                    }

                    let company = ctx
                        .companies()
                        .find_by_id(expense.company_id)
                        .await?
                        .ok_or_not_found()?;
                    let company_amount =
                        converter.convert(expense.amount, &expense.currency, &company.currency)?;

                    let manager_id = match submitter.manager_id {
                        Some(manager_id) => ctx
                            .users()
                            .find_by_id(manager_id)
                            .await?
                            .filter(|m| m.company_id == submitter.company_id)
                            .map(|m| m.id),
                        None => None,
                    };

                    let rules = ctx.rules().list(expense.company_id).await?;
                    let rule = select_rule(&rules, submitter.id, &expense.category);
                    let condition = rule.map(|r| r.condition).unwrap_or_default();

                    let mut chain = build_chain(expense.id, rule, submitter.id, manager_id);
                    let policy = ChainPolicy::for_chain(condition, &chain);
                    let resolution = start(&mut chain, &policy);

                    ctx.expenses().insert_steps(&chain).await?;
                    let expense = ctx
                        .expenses()
                        .mark_submitted(
                            expense.id,
                            Submission {
                                rule_id: rule.map(|r| r.id),
                                condition,
                                company_amount,
                                status: status_for(resolution.outcome),
                                at: now,
                            },
                        )
                        .await?;

                    Ok(Progress {
                        expense,
                        chain,
                        newly_pending: resolution.newly_pending,
                    })
                })
            })
            .await?;

        tracing::info!(
            expense_id = %id,
            rule_id = ?progress.expense.rule_id,
            steps = progress.chain.len(),
            status = %progress.expense.status,
            "Expense submitted"
        );

        self.announce(&progress).await;
        Ok(ExpenseResponse::with_steps(progress.expense, progress.chain))
    }

    async fn get_expense(&self, actor: &User, id: Uuid) -> AppResult<ExpenseResponse> {
        let expense = self
            .uow
            .expenses()
            .find_by_id(id)
            .await?
            .filter(|e| e.company_id == actor.company_id)
            .ok_or_not_found()?;

        let chain = self.uow.expenses().steps(id).await?;
        if !self.can_view(actor, &expense, &chain).await? {
            return Err(AppError::Forbidden);
        }

        Ok(ExpenseResponse::with_steps(expense, chain))
    }

    async fn list_expenses(
        &self,
        actor: &User,
        scope: ExpenseScope,
        status: Option<ExpenseStatus>,
        params: PaginationParams,
    ) -> AppResult<(Vec<ExpenseResponse>, u64)> {
        let owner = match (scope, actor.role) {
            (ExpenseScope::Mine, _) => ExpenseOwnerFilter::Employee(actor.id),
            (ExpenseScope::Team, UserRole::Admin) | (ExpenseScope::Company, UserRole::Admin) => {
                ExpenseOwnerFilter::Company
            }
            (ExpenseScope::Team, UserRole::Manager) => ExpenseOwnerFilter::ManagedBy(actor.id),
            _ => return Err(AppError::Forbidden),
        };

        let (expenses, total) = self
            .uow
            .expenses()
            .list(actor.company_id, owner, status, params)
            .await?;

        Ok((expenses.into_iter().map(ExpenseResponse::from).collect(), total))
    }

    async fn pending_approvals(&self, actor: &User) -> AppResult<Vec<ExpenseResponse>> {
        let expenses = self.uow.expenses().pending_for(actor.id).await?;

        let mut responses = Vec::with_capacity(expenses.len());
        for expense in expenses {
            let chain = self.uow.expenses().steps(expense.id).await?;
            responses.push(ExpenseResponse::with_steps(expense, chain));
        }

        Ok(responses)
    }

    async fn approve(&self, actor: &User, id: Uuid, comment: Option<String>) -> AppResult<ExpenseResponse> {
        self.record_decision(actor, id, Decision::Approve, non_blank(comment))
            .await
    }

    async fn reject(&self, actor: &User, id: Uuid, comment: String) -> AppResult<ExpenseResponse> {
        let comment = non_blank(Some(comment))
            .ok_or_else(|| AppError::validation("A comment is required to reject an expense"))?;

        self.record_decision(actor, id, Decision::Reject, Some(comment))
            .await
    }

    async fn override_decision(
        &self,
        actor: &User,
        id: Uuid,
        decision: Decision,
        comment: Option<String>,
    ) -> AppResult<ExpenseResponse> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let company_id = actor.company_id;
        let note = match non_blank(comment) {
            Some(comment) => format!("Overridden by {}: {}", actor.name, comment),
            None => format!("Overridden by {}", actor.name),
        };
        let now = Utc::now();

        let progress = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let expense = ctx
                        .expenses()
                        .find_for_update(id)
                        .await?
                        .filter(|e| e.company_id == company_id)
                        .ok_or_not_found()?;

                    if expense.status != ExpenseStatus::Pending {
                        return Err(AppError::invalid_state("Only pending expenses can be overridden"));
                    }

                    let mut chain = ctx.expenses().steps(expense.id).await?;
                    let open: Vec<Uuid> = chain
                        .iter()
                        .filter(|s| s.status.is_open())
                        .map(|s| s.id)
                        .collect();

                    let outcome = override_chain(&mut chain, decision);
                    for step in chain.iter_mut().filter(|s| open.contains(&s.id)) {
                        step.comment = Some(note.clone());
                        step.acted_at = Some(now);
                    }

                    ctx.expenses().save_steps(&chain).await?;
                    let expense = ctx
                        .expenses()
                        .mark_decided(expense.id, status_for(outcome), now)
                        .await?;

                    Ok(Progress {
                        expense,
                        chain,
                        newly_pending: Vec::new(),
                    })
                })
            })
            .await?;

        tracing::info!(
            expense_id = %id,
            admin_id = %actor.id,
            status = %progress.expense.status,
            "Expense decision overridden"
        );

        self.announce(&progress).await;
        Ok(ExpenseResponse::with_steps(progress.expense, progress.chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_amount_validation() {
        assert!(validate_amount(Decimal::from_str("12.50").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("12.500").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("12.505").unwrap()).is_err());
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::from_str("-1").unwrap()).is_err());
        assert!(validate_amount(Decimal::from_str("999999999999.99").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("1000000000000").unwrap()).is_err());
    }

    #[test]
    fn test_outcome_maps_to_status() {
        assert_eq!(status_for(Outcome::Pending), ExpenseStatus::Pending);
        assert_eq!(status_for(Outcome::Approved), ExpenseStatus::Approved);
        assert_eq!(status_for(Outcome::Rejected), ExpenseStatus::Rejected);
    }

    #[test]
    fn test_blank_text_is_dropped() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" cash ".to_string())), Some("cash".to_string()));
        assert_eq!(non_blank(None), None);
    }
}
