//! Infrastructure layer: database, repositories, rate limiting and mail.

pub mod cache;
pub mod db;
pub mod mailer;
pub mod repositories;
pub mod unit_of_work;

pub use cache::{Cache, MemoryRateLimiter, RateLimiter};
pub use db::{Database, Migrator};
pub use mailer::{LogMailer, Mailer, QueuedMailer};
pub use repositories::{
    CompanyRepository, CompanyStore, ExpenseRepository, ExpenseStore, RuleRepository, RuleStore,
    Submission, UserRepository, UserStore,
};
pub use unit_of_work::{
    Persistence, TransactionContext, TxCompanyRepository, TxExpenseRepository, TxFuture,
    TxOtpRepository, TxRuleRepository, TxUserRepository, UnitOfWork,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mailer::MockMailer;
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::{
    MockCompanyRepository, MockExpenseRepository, MockRuleRepository, MockUserRepository,
};
