//! Repository layer: data access behind traits the services depend on.

mod base;
pub(crate) mod company_repository;
pub(crate) mod entities;
pub(crate) mod expense_repository;
pub(crate) mod otp_repository;
pub(crate) mod rule_repository;
pub(crate) mod user_repository;

pub use company_repository::{CompanyRepository, CompanyStore};
pub use expense_repository::{ExpenseRepository, ExpenseStore, Submission};
pub use rule_repository::{RuleRepository, RuleStore};
pub use user_repository::{UserRepository, UserStore};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use company_repository::MockCompanyRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use expense_repository::MockExpenseRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use rule_repository::MockRuleRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
