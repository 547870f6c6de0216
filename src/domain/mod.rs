//! Domain layer: entities, value objects and the pure business rules.
//!
//! Nothing here touches the database or the network.

pub mod approval;
pub mod company;
pub mod currency;
pub mod dashboard;
pub mod expense;
pub mod otp;
pub mod password;
pub mod user;

pub use approval::{
    ApprovalCondition, ApprovalRule, ApprovalStep, ChainPolicy, Decision, Outcome, Resolution,
    RuleApprover, RuleDefinition, StepStatus,
};
pub use company::{Company, NewCompany};
pub use currency::CurrencyConverter;
pub use dashboard::{DashboardSummary, StatusTotal, StatusTotals};
pub use expense::{
    ApprovalStepResponse, Expense, ExpenseChanges, ExpenseOwnerFilter, ExpenseResponse,
    ExpenseScope, ExpenseStatus, NewExpense,
};
pub use otp::{NewOtp, Otp, OtpCheck, OtpCode};
pub use password::Password;
pub use user::{NewUser, User, UserChanges, UserResponse, UserRole};
