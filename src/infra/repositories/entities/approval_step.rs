//! Approval step database entity.

use sea_orm::entity::prelude::*;

use crate::domain::{ApprovalStep, StepStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "approval_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    pub sequence: i32,
    pub stage: i32,
    pub required: bool,
    pub status: String,
    pub comment: Option<String>,
    pub acted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ApprovalStep {
    fn from(model: Model) -> Self {
        ApprovalStep {
            id: model.id,
            expense_id: model.expense_id,
            approver_id: model.approver_id,
            sequence: model.sequence,
            stage: model.stage,
            required: model.required,
            status: StepStatus::from(model.status.as_str()),
            comment: model.comment,
            acted_at: model.acted_at,
        }
    }
}
