//! Migration: expenses and their approval steps.
//!
//! `rule_id` carries no foreign key: deleting a rule leaves submitted
//! expenses untouched.

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
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Expenses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Expenses::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(ColumnDef::new(Expenses::Category).string().not_null())
                    .col(ColumnDef::new(Expenses::Amount).decimal_len(14, 2).not_null())
                    .col(ColumnDef::new(Expenses::Currency).string_len(3).not_null())
                    .col(
                        ColumnDef::new(Expenses::CompanyAmount)
                            .decimal_len(14, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::ExpenseDate).date().not_null())
                    .col(ColumnDef::new(Expenses::PaidBy).string().null())
                    .col(ColumnDef::new(Expenses::Remarks).text().null())
                    .col(ColumnDef::new(Expenses::Status).string().not_null())
                    .col(ColumnDef::new(Expenses::RuleId).uuid().null())
                    .col(ColumnDef::new(Expenses::ConditionType).string().null())
                    .col(ColumnDef::new(Expenses::ConditionPercentage).integer().null())
                    .col(ColumnDef::new(Expenses::ConditionApproverId).uuid().null())
                    .col(ColumnDef::new(Expenses::SubmittedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Expenses::DecidedAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Expenses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Expenses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expenses_company")
                            .from(Expenses::Table, Expenses::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expenses_employee")
                            .from(Expenses::Table, Expenses::EmployeeId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expenses_company_status")
                    .table(Expenses::Table)
                    .col(Expenses::CompanyId)
                    .col(Expenses::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expenses_employee")
                    .table(Expenses::Table)
                    .col(Expenses::EmployeeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalSteps::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ApprovalSteps::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ApprovalSteps::ExpenseId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalSteps::ApproverId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalSteps::Sequence).integer().not_null())
                    .col(ColumnDef::new(ApprovalSteps::Stage).integer().not_null())
                    .col(ColumnDef::new(ApprovalSteps::Required).boolean().not_null())
                    .col(ColumnDef::new(ApprovalSteps::Status).string().not_null())
                    .col(ColumnDef::new(ApprovalSteps::Comment).text().null())
                    .col(ColumnDef::new(ApprovalSteps::ActedAt).timestamp_with_time_zone().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_steps_expense")
                            .from(ApprovalSteps::Table, ApprovalSteps::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_steps_approver")
                            .from(ApprovalSteps::Table, ApprovalSteps::ApproverId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_steps_expense_sequence")
                    .table(ApprovalSteps::Table)
                    .col(ApprovalSteps::ExpenseId)
                    .col(ApprovalSteps::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_steps_approver_status")
                    .table(ApprovalSteps::Table)
                    .col(ApprovalSteps::ApproverId)
                    .col(ApprovalSteps::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApprovalSteps::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    Description,
    Category,
    Amount,
    Currency,
    CompanyAmount,
    ExpenseDate,
    PaidBy,
    Remarks,
    Status,
    RuleId,
    ConditionType,
    ConditionPercentage,
    ConditionApproverId,
    SubmittedAt,
    DecidedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ApprovalSteps {
    Table,
    Id,
    ExpenseId,
    ApproverId,
    Sequence,
    Stage,
    Required,
    Status,
    Comment,
    ActedAt,
}
