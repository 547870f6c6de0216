//! One approver of an approval rule.

use sea_orm::entity::prelude::*;

use crate::domain::RuleApprover;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rule_approvers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub rule_id: Uuid,
    pub user_id: Uuid,
    pub position: i32,
    pub required: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RuleApprover {
    fn from(model: Model) -> Self {
        RuleApprover {
            user_id: model.user_id,
            required: model.required,
        }
    }
}
