//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They act on behalf of an authenticated `User` and
//! reach storage only through the Unit of Work.

mod auth_service;
mod company_service;
pub mod container;
mod dashboard_service;
mod expense_service;
mod notifier;
mod rule_service;
mod user_service;

#[cfg(test)]
mod testing;

pub use container::{ServiceContainer, Services};
pub use notifier::Notifier;

pub use auth_service::{AuthService, Authenticator, Claims, Signup, SignupResponse, TokenResponse};
pub use company_service::{CompanyManager, CompanyService};
pub use dashboard_service::{DashboardBuilder, DashboardService};
pub use expense_service::{DraftChanges, ExpenseDraft, ExpenseManager, ExpenseService};
pub use rule_service::{RuleManager, RuleService};
pub use user_service::{NewMember, UserManager, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
