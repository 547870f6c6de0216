//! Approval rule repository. A rule and its approvers are read and written together.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::approval_rule::{self, ActiveModel, Entity as RuleEntity};
use super::entities::rule_approver::{self, Entity as ApproverEntity};
use crate::domain::{ApprovalCondition, ApprovalRule, RuleApprover, RuleDefinition};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Read access to approval rules; writes go through the unit of work.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ApprovalRule>>;

    /// A company's rules, oldest first
    async fn list(&self, company_id: Uuid) -> AppResult<Vec<ApprovalRule>>;

    /// Number of rules listing the user as an approver
    async fn count_with_approver(&self, user_id: Uuid) -> AppResult<u64>;
}

/// Concrete implementation of RuleRepository
pub struct RuleStore {
    db: DatabaseConnection,
}

impl RuleStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RuleRepository for RuleStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ApprovalRule>> {
        find_by_id(&self.db, id).await
    }

    async fn list(&self, company_id: Uuid) -> AppResult<Vec<ApprovalRule>> {
        list(&self.db, company_id).await
    }

    async fn count_with_approver(&self, user_id: Uuid) -> AppResult<u64> {
        let count = ApproverEntity::find()
            .filter(rule_approver::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

fn assemble(model: approval_rule::Model, approvers: Vec<RuleApprover>) -> AppResult<ApprovalRule> {
    let condition = ApprovalCondition::from_parts(
        &model.condition_type,
        model.condition_percentage,
        model.condition_approver_id,
    )?;

    Ok(ApprovalRule {
        id: model.id,
        company_id: model.company_id,
        name: model.name,
        description: model.description,
        category: model.category,
        user_id: model.user_id,
        manager_first: model.manager_first,
        sequential: model.sequential,
        condition,
        approvers,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

async fn approvers_of<C: ConnectionTrait>(db: &C, rule_ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, Vec<RuleApprover>>> {
    let mut grouped: HashMap<Uuid, Vec<RuleApprover>> = HashMap::new();
    if rule_ids.is_empty() {
        return Ok(grouped);
    }

    let models = ApproverEntity::find()
        .filter(rule_approver::Column::RuleId.is_in(rule_ids))
        .order_by_asc(rule_approver::Column::Position)
        .all(db)
        .await?;

    for model in models {
        grouped
            .entry(model.rule_id)
            .or_default()
            .push(RuleApprover::from(model));
    }

    Ok(grouped)
}

async fn replace_approvers<C: ConnectionTrait>(
    db: &C,
    rule_id: Uuid,
    approvers: &[RuleApprover],
) -> AppResult<()> {
    ApproverEntity::delete_many()
        .filter(rule_approver::Column::RuleId.eq(rule_id))
        .exec(db)
        .await?;

    if approvers.is_empty() {
        return Ok(());
    }

    let models = approvers
        .iter()
        .enumerate()
        .map(|(position, approver)| rule_approver::ActiveModel {
            id: Set(Uuid::new_v4()),
            rule_id: Set(rule_id),
            user_id: Set(approver.user_id),
            position: Set(position as i32),
            required: Set(approver.required),
        });

    ApproverEntity::insert_many(models).exec(db).await?;
    Ok(())
}

fn apply_definition(active: &mut ActiveModel, definition: &RuleDefinition) {
    active.name = Set(definition.name.clone());
    active.description = Set(definition.description.clone());
    active.category = Set(definition.category.clone());
    active.user_id = Set(definition.user_id);
    active.manager_first = Set(definition.manager_first);
    active.sequential = Set(definition.sequential);
    active.condition_type = Set(definition.condition.kind().to_string());
    active.condition_percentage = Set(definition.condition.percentage().map(i32::from));
    active.condition_approver_id = Set(definition.condition.specific_approver());
}

// -----------------------------------------------------------------------------
// Queries shared with the transaction-bound repository
// -----------------------------------------------------------------------------

pub(crate) async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<ApprovalRule>> {
    let Some(model) = RuleEntity::find_by_id(id).one(db).await? else {
        return Ok(None);
    };

    let approvers = approvers_of(db, vec![id])
        .await?
        .remove(&id)
        .unwrap_or_default();

    assemble(model, approvers).map(Some)
}

pub(crate) async fn list<C: ConnectionTrait>(db: &C, company_id: Uuid) -> AppResult<Vec<ApprovalRule>> {
    let models = RuleEntity::find()
        .filter(approval_rule::Column::CompanyId.eq(company_id))
        .order_by_asc(approval_rule::Column::CreatedAt)
        .order_by_asc(approval_rule::Column::Id)
        .all(db)
        .await?;

    let mut approvers = approvers_of(db, models.iter().map(|m| m.id).collect()).await?;

    models
        .into_iter()
        .map(|model| {
            let listed = approvers.remove(&model.id).unwrap_or_default();
            assemble(model, listed)
        })
        .collect()
}

pub(crate) async fn create<C: ConnectionTrait>(
    db: &C,
    company_id: Uuid,
    definition: RuleDefinition,
) -> AppResult<ApprovalRule> {
    let now = Utc::now();
    let mut active = ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_definition(&mut active, &definition);

    let model = active.insert(db).await?;
    replace_approvers(db, model.id, &definition.approvers).await?;

    assemble(model, definition.approvers)
}

pub(crate) async fn update<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    definition: RuleDefinition,
) -> AppResult<ApprovalRule> {
    let model = RuleEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = model.into();
    apply_definition(&mut active, &definition);
    active.updated_at = Set(Utc::now());

    let model = active.update(db).await?;
    replace_approvers(db, id, &definition.approvers).await?;

    assemble(model, definition.approvers)
}

pub(crate) async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<()> {
    ApproverEntity::delete_many()
        .filter(rule_approver::Column::RuleId.eq(id))
        .exec(db)
        .await?;

    let result = RuleEntity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(())
}
