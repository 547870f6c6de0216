//! Migration: approval rules and their ordered approvers.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_companies_and_users::{Companies, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApprovalRules::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ApprovalRules::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ApprovalRules::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRules::Name).string().not_null())
                    .col(ColumnDef::new(ApprovalRules::Description).text().null())
                    .col(ColumnDef::new(ApprovalRules::Category).string().null())
                    .col(ColumnDef::new(ApprovalRules::UserId).uuid().null())
                    .col(
                        ColumnDef::new(ApprovalRules::ManagerFirst)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ApprovalRules::Sequential)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ApprovalRules::ConditionType).string().not_null())
                    .col(ColumnDef::new(ApprovalRules::ConditionPercentage).integer().null())
                    .col(ColumnDef::new(ApprovalRules::ConditionApproverId).uuid().null())
                    .col(
                        ColumnDef::new(ApprovalRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalRules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_rules_company")
                            .from(ApprovalRules::Table, ApprovalRules::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_rules_user")
                            .from(ApprovalRules::Table, ApprovalRules::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_rules_company")
                    .table(ApprovalRules::Table)
                    .col(ApprovalRules::CompanyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RuleApprovers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RuleApprovers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RuleApprovers::RuleId).uuid().not_null())
                    .col(ColumnDef::new(RuleApprovers::UserId).uuid().not_null())
                    .col(ColumnDef::new(RuleApprovers::Position).integer().not_null())
                    .col(
                        ColumnDef::new(RuleApprovers::Required)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rule_approvers_rule")
                            .from(RuleApprovers::Table, RuleApprovers::RuleId)
                            .to(ApprovalRules::Table, ApprovalRules::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rule_approvers_user")
                            .from(RuleApprovers::Table, RuleApprovers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rule_approvers_rule_user")
                    .table(RuleApprovers::Table)
                    .col(RuleApprovers::RuleId)
                    .col(RuleApprovers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RuleApprovers::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ApprovalRules::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ApprovalRules {
    Table,
    Id,
    CompanyId,
    Name,
    Description,
    Category,
    UserId,
    ManagerFirst,
    Sequential,
    ConditionType,
    ConditionPercentage,
    ConditionApproverId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum RuleApprovers {
    Table,
    Id,
    RuleId,
    UserId,
    Position,
    Required,
}
