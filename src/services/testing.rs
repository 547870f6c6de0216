//! Unit of work over mockall repositories for service unit tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{
    CompanyRepository, ExpenseRepository, MockCompanyRepository, MockExpenseRepository,
    MockRuleRepository, MockUserRepository, RuleRepository, TransactionContext, TxFuture,
    UnitOfWork, UserRepository,
};

/// Repositories without expectations panic when called.
pub(crate) struct StubUnitOfWork {
    users: Arc<dyn UserRepository>,
    companies: Arc<dyn CompanyRepository>,
    expenses: Arc<dyn ExpenseRepository>,
    rules: Arc<dyn RuleRepository>,
}

impl Default for StubUnitOfWork {
    fn default() -> Self {
        Self {
            users: Arc::new(MockUserRepository::new()),
            companies: Arc::new(MockCompanyRepository::new()),
            expenses: Arc::new(MockExpenseRepository::new()),
            rules: Arc::new(MockRuleRepository::new()),
        }
    }
}

impl StubUnitOfWork {
    pub(crate) fn with_users(mut self, users: MockUserRepository) -> Self {
        self.users = Arc::new(users);
        self
    }

    pub(crate) fn with_companies(mut self, companies: MockCompanyRepository) -> Self {
        self.companies = Arc::new(companies);
        self
    }

    pub(crate) fn with_expenses(mut self, expenses: MockExpenseRepository) -> Self {
        self.expenses = Arc::new(expenses);
        self
    }

    pub(crate) fn with_rules(mut self, rules: MockRuleRepository) -> Self {
        self.rules = Arc::new(rules);
        self
    }
}

#[async_trait]
impl UnitOfWork for StubUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn companies(&self) -> Arc<dyn CompanyRepository> {
        self.companies.clone()
    }

    fn expenses(&self) -> Arc<dyn ExpenseRepository> {
        self.expenses.clone()
    }

    fn rules(&self) -> Arc<dyn RuleRepository> {
        self.rules.clone()
    }

    async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        Err(AppError::internal("Transactions are not available in unit tests"))
    }
}

pub(crate) fn user(role: UserRole, company_id: Uuid) -> User {
    User {
        id: Uuid::new_v4(),
        company_id,
        email: format!("{}@acme.example", Uuid::new_v4().simple()),
        password_hash: "hashed".to_string(),
        name: "Test User".to_string(),
        role,
        manager_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}
