//! Expense claim domain entity and related types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::approval::{ApprovalCondition, ApprovalStep, StepStatus};

/// Lifecycle of an expense claim.
///
/// `Draft -> Pending -> Approved | Rejected`; drafts are the only editable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Draft => "draft",
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }

    /// Approved or rejected
    pub fn is_final(&self) -> bool {
        matches!(self, ExpenseStatus::Approved | ExpenseStatus::Rejected)
    }
}

impl From<&str> for ExpenseStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => ExpenseStatus::Pending,
            "approved" => ExpenseStatus::Approved,
            "rejected" => ExpenseStatus::Rejected,
            _ => ExpenseStatus::Draft,
        }
    }
}

impl std::fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expense domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub description: String,
    pub category: String,
    /// Amount in the currency it was paid in
    pub amount: Decimal,
    pub currency: String,
    /// Amount converted into the company currency
    pub company_amount: Decimal,
    pub expense_date: NaiveDate,
    pub paid_by: Option<String>,
    pub remarks: Option<String>,
    pub status: ExpenseStatus,
    /// Rule applied when the expense was submitted
    pub rule_id: Option<Uuid>,
    /// Condition the chain is evaluated against, fixed at submission
    pub condition: Option<ApprovalCondition>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn is_draft(&self) -> bool {
        self.status == ExpenseStatus::Draft
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.employee_id == user_id
    }
}

/// Data required to insert an expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub description: String,
    pub category: String,
    pub amount: Decimal,
    pub currency: String,
    pub company_amount: Decimal,
    pub expense_date: NaiveDate,
    pub paid_by: Option<String>,
    pub remarks: Option<String>,
}

/// Changes to a draft expense. Monetary fields travel together so the
/// converted amount always matches the stored amount and currency.
#[derive(Debug, Clone, Default)]
pub struct ExpenseChanges {
    pub description: Option<String>,
    pub category: Option<String>,
    pub money: Option<(Decimal, String, Decimal)>,
    pub expense_date: Option<NaiveDate>,
    pub paid_by: Option<Option<String>>,
    pub remarks: Option<Option<String>>,
}

/// Which expenses a listing covers, relative to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseScope {
    /// The caller's own claims
    #[default]
    Mine,
    /// Direct reports (managers) or the whole company (admins)
    Team,
    /// Every claim in the company (admins)
    Company,
}

/// Repository-level filter derived from a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseOwnerFilter {
    Employee(Uuid),
    ManagedBy(Uuid),
    Company,
}

/// One approval step as returned to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApprovalStepResponse {
    pub id: Uuid,
    pub approver_id: Uuid,
    pub sequence: i32,
    pub stage: i32,
    pub required: bool,
    pub status: StepStatus,
    pub comment: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
}

impl From<ApprovalStep> for ApprovalStepResponse {
    fn from(step: ApprovalStep) -> Self {
        Self {
            id: step.id,
            approver_id: step.approver_id,
            sequence: step.sequence,
            stage: step.stage,
            required: step.required,
            status: step.status,
            comment: step.comment,
            acted_at: step.acted_at,
        }
    }
}

/// Expense as returned to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExpenseResponse {
    pub id: Uuid,
    pub employee_id: Uuid,
    #[schema(example = "Client dinner")]
    pub description: String,
    #[schema(example = "Food")]
    pub category: String,
    #[schema(value_type = String, example = "125.50")]
    pub amount: Decimal,
    #[schema(example = "EUR")]
    pub currency: String,
    #[schema(value_type = String, example = "11340.25")]
    pub company_amount: Decimal,
    pub expense_date: NaiveDate,
    pub paid_by: Option<String>,
    pub remarks: Option<String>,
    pub status: ExpenseStatus,
    pub rule_id: Option<Uuid>,
    pub condition: Option<ApprovalCondition>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Approval chain, empty for drafts and list views
    pub approvals: Vec<ApprovalStepResponse>,
}

impl ExpenseResponse {
    pub fn with_steps(expense: Expense, steps: Vec<ApprovalStep>) -> Self {
        let mut response = Self::from(expense);
        response.approvals = steps.into_iter().map(ApprovalStepResponse::from).collect();
        response
    }
}

impl From<Expense> for ExpenseResponse {
    fn from(expense: Expense) -> Self {
        Self {
            id: expense.id,
            employee_id: expense.employee_id,
            description: expense.description,
            category: expense.category,
            amount: expense.amount,
            currency: expense.currency,
            company_amount: expense.company_amount,
            expense_date: expense.expense_date,
            paid_by: expense.paid_by,
            remarks: expense.remarks,
            status: expense.status,
            rule_id: expense.rule_id,
            condition: expense.condition,
            submitted_at: expense.submitted_at,
            decided_at: expense.decided_at,
            created_at: expense.created_at,
            updated_at: expense.updated_at,
            approvals: Vec::new(),
        }
    }
}

/// Normalize a category for comparison: trimmed, lower-case.
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}
