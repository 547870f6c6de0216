//! Expense database entity.

use sea_orm::entity::prelude::*;

use crate::domain::{ApprovalCondition, Expense, ExpenseStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub description: String,
    pub category: String,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub company_amount: Decimal,
    pub expense_date: Date,
    pub paid_by: Option<String>,
    pub remarks: Option<String>,
    pub status: String,
    pub rule_id: Option<Uuid>,
    /// Snapshot of the rule condition taken at submission
    pub condition_type: Option<String>,
    pub condition_percentage: Option<i32>,
    pub condition_approver_id: Option<Uuid>,
    pub submitted_at: Option<DateTimeUtc>,
    pub decided_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Expense {
    fn from(model: Model) -> Self {
        let condition = model.condition_type.as_deref().and_then(|kind| {
            ApprovalCondition::from_parts(kind, model.condition_percentage, model.condition_approver_id)
                .map_err(|e| tracing::error!(expense_id = %model.id, error = %e, "Corrupt condition snapshot"))
                .ok()
        });

        Expense {
            id: model.id,
            company_id: model.company_id,
            employee_id: model.employee_id,
            description: model.description,
            category: model.category,
            amount: model.amount,
            currency: model.currency,
            company_amount: model.company_amount,
            expense_date: model.expense_date,
            paid_by: model.paid_by,
            remarks: model.remarks,
            status: ExpenseStatus::from(model.status.as_str()),
            rule_id: model.rule_id,
            condition,
            submitted_at: model.submitted_at,
            decided_at: model.decided_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
