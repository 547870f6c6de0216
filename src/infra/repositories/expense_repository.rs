//! Expense and approval step repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
    Set,
};
use uuid::Uuid;

use super::base::{fetch_page, supports_row_locks};
use super::entities::approval_step::{self, Entity as StepEntity};
use super::entities::expense::{self, ActiveModel, Entity as ExpenseEntity};
use super::entities::user::{self, Entity as UserEntity};
use crate::domain::{
    ApprovalCondition, ApprovalStep, Expense, ExpenseChanges, ExpenseOwnerFilter, ExpenseStatus,
    NewExpense, StepStatus,
};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Expense repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Expense>>;

    /// Insert a draft
    async fn create(&self, expense: NewExpense) -> AppResult<Expense>;

    /// Apply changes to a draft
    async fn update_draft(&self, id: Uuid, changes: ExpenseChanges) -> AppResult<Expense>;

    /// Remove a draft
    async fn delete_draft(&self, id: Uuid) -> AppResult<()>;

    /// One page of expenses, newest expense date first
    async fn list(
        &self,
        company_id: Uuid,
        owner: ExpenseOwnerFilter,
        status: Option<ExpenseStatus>,
        params: PaginationParams,
    ) -> AppResult<(Vec<Expense>, u64)>;

    /// Every expense matching `owner`, for aggregation
    async fn all_for(&self, company_id: Uuid, owner: ExpenseOwnerFilter) -> AppResult<Vec<Expense>>;

    /// An expense's chain in sequence order
    async fn steps(&self, expense_id: Uuid) -> AppResult<Vec<ApprovalStep>>;

    /// Pending expenses with a step awaiting `approver_id`, oldest submission first
    async fn pending_for(&self, approver_id: Uuid) -> AppResult<Vec<Expense>>;

    async fn count_pending_for(&self, approver_id: Uuid) -> AppResult<u64>;

    /// Pending expenses with a waiting or pending step for the approver
    async fn count_open_for(&self, approver_id: Uuid) -> AppResult<u64>;
}

/// Concrete implementation of ExpenseRepository
pub struct ExpenseStore {
    db: DatabaseConnection,
}

impl ExpenseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExpenseRepository for ExpenseStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Expense>> {
        let result = ExpenseEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Expense::from))
    }

    async fn create(&self, new_expense: NewExpense) -> AppResult<Expense> {
        create(&self.db, new_expense).await
    }

    async fn update_draft(&self, id: Uuid, changes: ExpenseChanges) -> AppResult<Expense> {
        let model = find_draft_model(&self.db, id).await?;
        let mut active: ActiveModel = model.into();

        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(category) = changes.category {
            active.category = Set(category);
        }
        if let Some((amount, currency, company_amount)) = changes.money {
            active.amount = Set(amount);
            active.currency = Set(currency);
            active.company_amount = Set(company_amount);
        }
        if let Some(expense_date) = changes.expense_date {
            active.expense_date = Set(expense_date);
        }
        if let Some(paid_by) = changes.paid_by {
            active.paid_by = Set(paid_by);
        }
        if let Some(remarks) = changes.remarks {
            active.remarks = Set(remarks);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Expense::from(model))
    }

    async fn delete_draft(&self, id: Uuid) -> AppResult<()> {
        let result = ExpenseEntity::delete_many()
            .filter(expense::Column::Id.eq(id))
            .filter(expense::Column::Status.eq(ExpenseStatus::Draft.as_str()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::invalid_state("Only draft expenses can be deleted"));
        }

        Ok(())
    }

    async fn list(
        &self,
        company_id: Uuid,
        owner: ExpenseOwnerFilter,
        status: Option<ExpenseStatus>,
        params: PaginationParams,
    ) -> AppResult<(Vec<Expense>, u64)> {
        let mut select = scoped(company_id, owner);
        if let Some(status) = status {
            select = select.filter(expense::Column::Status.eq(status.as_str()));
        }
        let select = select
            .order_by_desc(expense::Column::ExpenseDate)
            .order_by_desc(expense::Column::CreatedAt)
            .order_by_asc(expense::Column::Id);

        let (models, total) = fetch_page(select, &self.db, &params).await?;
        Ok((models.into_iter().map(Expense::from).collect(), total))
    }

    async fn all_for(&self, company_id: Uuid, owner: ExpenseOwnerFilter) -> AppResult<Vec<Expense>> {
        let models = scoped(company_id, owner).all(&self.db).await?;
        Ok(models.into_iter().map(Expense::from).collect())
    }

    async fn steps(&self, expense_id: Uuid) -> AppResult<Vec<ApprovalStep>> {
        steps(&self.db, expense_id).await
    }

    async fn pending_for(&self, approver_id: Uuid) -> AppResult<Vec<Expense>> {
        let models = ExpenseEntity::find()
            .filter(expense::Column::Status.eq(ExpenseStatus::Pending.as_str()))
            .filter(expense::Column::Id.in_subquery(pending_steps_of(approver_id)))
            .order_by_asc(expense::Column::SubmittedAt)
            .order_by_asc(expense::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Expense::from).collect())
    }

    async fn count_pending_for(&self, approver_id: Uuid) -> AppResult<u64> {
        let count = ExpenseEntity::find()
            .filter(expense::Column::Status.eq(ExpenseStatus::Pending.as_str()))
            .filter(expense::Column::Id.in_subquery(pending_steps_of(approver_id)))
            .count(&self.db)
            .await?;

        Ok(count)
    }

    async fn count_open_for(&self, approver_id: Uuid) -> AppResult<u64> {
        let open_steps = Query::select()
            .column(approval_step::Column::ExpenseId)
            .from(StepEntity)
            .cond_where(
                Condition::all()
                    .add(approval_step::Column::ApproverId.eq(approver_id))
                    .add(approval_step::Column::Status.is_in([
                        StepStatus::Waiting.as_str(),
                        StepStatus::Pending.as_str(),
                    ])),
            )
            .to_owned();

        let count = ExpenseEntity::find()
            .filter(expense::Column::Status.eq(ExpenseStatus::Pending.as_str()))
            .filter(expense::Column::Id.in_subquery(open_steps))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

fn scoped(company_id: Uuid, owner: ExpenseOwnerFilter) -> Select<ExpenseEntity> {
    let select = ExpenseEntity::find().filter(expense::Column::CompanyId.eq(company_id));

    match owner {
        ExpenseOwnerFilter::Employee(employee_id) => {
            select.filter(expense::Column::EmployeeId.eq(employee_id))
        }
        ExpenseOwnerFilter::ManagedBy(manager_id) => select.filter(
            expense::Column::EmployeeId.in_subquery(
                Query::select()
                    .column(user::Column::Id)
                    .from(UserEntity)
                    .and_where(user::Column::ManagerId.eq(manager_id))
                    .to_owned(),
            ),
        ),
        ExpenseOwnerFilter::Company => select,
    }
}

fn pending_steps_of(approver_id: Uuid) -> sea_orm::sea_query::SelectStatement {
    Query::select()
        .column(approval_step::Column::ExpenseId)
        .from(StepEntity)
        .cond_where(
            Condition::all()
                .add(approval_step::Column::ApproverId.eq(approver_id))
                .add(approval_step::Column::Status.eq(StepStatus::Pending.as_str())),
        )
        .to_owned()
}

async fn find_draft_model<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<expense::Model> {
    let model = ExpenseEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound)?;

    if model.status != ExpenseStatus::Draft.as_str() {
        return Err(AppError::invalid_state("Only draft expenses can be changed"));
    }

    Ok(model)
}

// -----------------------------------------------------------------------------
// Queries shared with the transaction-bound repository
// -----------------------------------------------------------------------------

pub(crate) async fn create<C: ConnectionTrait>(db: &C, new_expense: NewExpense) -> AppResult<Expense> {
    let now = Utc::now();
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(new_expense.company_id),
        employee_id: Set(new_expense.employee_id),
        description: Set(new_expense.description),
        category: Set(new_expense.category),
        amount: Set(new_expense.amount),
        currency: Set(new_expense.currency),
        company_amount: Set(new_expense.company_amount),
        expense_date: Set(new_expense.expense_date),
        paid_by: Set(new_expense.paid_by),
        remarks: Set(new_expense.remarks),
        status: Set(ExpenseStatus::Draft.as_str().to_string()),
        rule_id: Set(None),
        condition_type: Set(None),
        condition_percentage: Set(None),
        condition_approver_id: Set(None),
        submitted_at: Set(None),
        decided_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = active_model.insert(db).await?;
    Ok(Expense::from(model))
}

/// Load an expense, locking its row where the backend allows it.
pub(crate) async fn find_for_update<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<Expense>> {
    let mut select = ExpenseEntity::find_by_id(id);
    if supports_row_locks(db) {
        select = select.lock_exclusive();
    }

    let result = select.one(db).await?;
    Ok(result.map(Expense::from))
}

pub(crate) async fn steps<C: ConnectionTrait>(db: &C, expense_id: Uuid) -> AppResult<Vec<ApprovalStep>> {
    let models = StepEntity::find()
        .filter(approval_step::Column::ExpenseId.eq(expense_id))
        .order_by_asc(approval_step::Column::Sequence)
        .all(db)
        .await?;

    Ok(models.into_iter().map(ApprovalStep::from).collect())
}

pub(crate) async fn insert_steps<C: ConnectionTrait>(db: &C, chain: &[ApprovalStep]) -> AppResult<()> {
    if chain.is_empty() {
        return Ok(());
    }

    let models = chain.iter().map(|step| approval_step::ActiveModel {
        id: Set(step.id),
        expense_id: Set(step.expense_id),
        approver_id: Set(step.approver_id),
        sequence: Set(step.sequence),
        stage: Set(step.stage),
        required: Set(step.required),
        status: Set(step.status.as_str().to_string()),
        comment: Set(step.comment.clone()),
        acted_at: Set(step.acted_at),
    });

    StepEntity::insert_many(models).exec(db).await?;
    Ok(())
}

/// Persist the mutable part of every step.
pub(crate) async fn save_steps<C: ConnectionTrait>(db: &C, chain: &[ApprovalStep]) -> AppResult<()> {
    for step in chain {
        let active = approval_step::ActiveModel {
            id: Set(step.id),
            status: Set(step.status.as_str().to_string()),
            comment: Set(step.comment.clone()),
            acted_at: Set(step.acted_at),
            ..Default::default()
        };
        active.update(db).await?;
    }

    Ok(())
}

/// Submission details written when a draft leaves the draft state
#[derive(Debug, Clone)]
pub struct Submission {
    pub rule_id: Option<Uuid>,
    pub condition: ApprovalCondition,
    pub company_amount: Decimal,
    pub status: ExpenseStatus,
    pub at: DateTime<Utc>,
}

pub(crate) async fn mark_submitted<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    submission: Submission,
) -> AppResult<Expense> {
    let active = ActiveModel {
        id: Set(id),
        status: Set(submission.status.as_str().to_string()),
        rule_id: Set(submission.rule_id),
        condition_type: Set(Some(submission.condition.kind().to_string())),
        condition_percentage: Set(submission.condition.percentage().map(i32::from)),
        condition_approver_id: Set(submission.condition.specific_approver()),
        company_amount: Set(submission.company_amount),
        submitted_at: Set(Some(submission.at)),
        decided_at: Set(submission.status.is_final().then_some(submission.at)),
        updated_at: Set(submission.at),
        ..Default::default()
    };

    let model = active.update(db).await?;
    Ok(Expense::from(model))
}

pub(crate) async fn mark_decided<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    status: ExpenseStatus,
    at: DateTime<Utc>,
) -> AppResult<Expense> {
    let active = ActiveModel {
        id: Set(id),
        status: Set(status.as_str().to_string()),
        decided_at: Set(Some(at)),
        updated_at: Set(at),
        ..Default::default()
    };

    let model = active.update(db).await?;
    Ok(Expense::from(model))
}
