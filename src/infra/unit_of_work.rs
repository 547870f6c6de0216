//! Unit of Work: repository access plus transaction management.
//!
//! Multi-row writes (signup, submission, decisions, rule writes, password
//! resets) run inside [`UnitOfWork::transaction`] and reach the database only
//! through the transaction-bound repositories of [`TransactionContext`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction,
    IsolationLevel, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::repositories::{
    company_repository, expense_repository, otp_repository, rule_repository, user_repository,
    CompanyRepository, CompanyStore, ExpenseRepository, ExpenseStore, RuleRepository, RuleStore,
    Submission, UserRepository, UserStore,
};
use crate::domain::{
    ApprovalRule, ApprovalStep, Company, Expense, ExpenseStatus, NewCompany, NewOtp, NewUser, Otp,
    RuleDefinition, User,
};
use crate::errors::{AppError, AppResult};

/// Boxed future returned by transaction closures
pub type TxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly because of the generic transaction method; tests
/// either run against SQLite or stub the trait by hand.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;

    fn companies(&self) -> Arc<dyn CompanyRepository>;

    fn expenses(&self) -> Arc<dyn ExpenseRepository>;

    fn rules(&self) -> Arc<dyn RuleRepository>;

    /// Run `f` inside a transaction, committed on success and rolled back on error.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Repository access within one transaction.
pub struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub fn companies(&self) -> TxCompanyRepository<'_> {
        TxCompanyRepository { txn: self.txn }
    }

    pub fn users(&self) -> TxUserRepository<'_> {
        TxUserRepository { txn: self.txn }
    }

    pub fn expenses(&self) -> TxExpenseRepository<'_> {
        TxExpenseRepository { txn: self.txn }
    }

    pub fn rules(&self) -> TxRuleRepository<'_> {
        TxRuleRepository { txn: self.txn }
    }

    pub fn otps(&self) -> TxOtpRepository<'_> {
        TxOtpRepository { txn: self.txn }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    users: Arc<UserStore>,
    companies: Arc<CompanyStore>,
    expenses: Arc<ExpenseStore>,
    rules: Arc<RuleStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            users: Arc::new(UserStore::new(db.clone())),
            companies: Arc::new(CompanyStore::new(db.clone())),
            expenses: Arc::new(ExpenseStore::new(db.clone())),
            rules: Arc::new(RuleStore::new(db.clone())),
            db,
        }
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        let txn = match self.db.get_database_backend() {
            // SQLite has no per-transaction isolation settings
            DatabaseBackend::Sqlite => self.db.begin().await?,
            _ => {
                self.db
                    .begin_with_config(
                        Some(IsolationLevel::ReadCommitted),
                        Some(AccessMode::ReadWrite),
                    )
                    .await?
            }
        };

        Ok(txn)
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
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

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self.begin().await?;
        let ctx = TransactionContext::new(&txn);

        match f(ctx).await {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Transaction-bound company repository
pub struct TxCompanyRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxCompanyRepository<'_> {
    pub async fn create(&self, company: NewCompany) -> AppResult<Company> {
        company_repository::create(self.txn, company).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Company>> {
        company_repository::find_by_id(self.txn, id).await
    }
}

/// Transaction-bound user repository
pub struct TxUserRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxUserRepository<'_> {
    /// Find active user by ID
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        user_repository::find_by_id(self.txn, id).await
    }

    pub async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>> {
        user_repository::find_by_email_with_deleted(self.txn, email).await
    }

    pub async fn create(&self, user: NewUser) -> AppResult<User> {
        user_repository::create(self.txn, user).await
    }

    pub async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        user_repository::update_password(self.txn, id, password_hash).await
    }
}

/// Transaction-bound expense repository
pub struct TxExpenseRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxExpenseRepository<'_> {
    /// Load and lock an expense for the rest of the transaction
    pub async fn find_for_update(&self, id: Uuid) -> AppResult<Option<Expense>> {
        expense_repository::find_for_update(self.txn, id).await
    }

    pub async fn steps(&self, expense_id: Uuid) -> AppResult<Vec<ApprovalStep>> {
        expense_repository::steps(self.txn, expense_id).await
    }

    pub async fn insert_steps(&self, chain: &[ApprovalStep]) -> AppResult<()> {
        expense_repository::insert_steps(self.txn, chain).await
    }

    pub async fn save_steps(&self, chain: &[ApprovalStep]) -> AppResult<()> {
        expense_repository::save_steps(self.txn, chain).await
    }

    pub async fn mark_submitted(&self, id: Uuid, submission: Submission) -> AppResult<Expense> {
        expense_repository::mark_submitted(self.txn, id, submission).await
    }

    pub async fn mark_decided(
        &self,
        id: Uuid,
        status: ExpenseStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Expense> {
        expense_repository::mark_decided(self.txn, id, status, at).await
    }
}

/// Transaction-bound rule repository
pub struct TxRuleRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxRuleRepository<'_> {
    pub async fn list(&self, company_id: Uuid) -> AppResult<Vec<ApprovalRule>> {
        rule_repository::list(self.txn, company_id).await
    }

    pub async fn create(&self, company_id: Uuid, definition: RuleDefinition) -> AppResult<ApprovalRule> {
        rule_repository::create(self.txn, company_id, definition).await
    }

    pub async fn update(&self, id: Uuid, definition: RuleDefinition) -> AppResult<ApprovalRule> {
        rule_repository::update(self.txn, id, definition).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        rule_repository::delete(self.txn, id).await
    }
}

/// Transaction-bound one-time code repository
pub struct TxOtpRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxOtpRepository<'_> {
    /// Consume every outstanding code, returning how many there were
    pub async fn consume_outstanding(
        &self,
        email: &str,
        purpose: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        otp_repository::consume_outstanding(self.txn, email, purpose, now).await
    }

    pub async fn create(&self, otp: NewOtp) -> AppResult<Otp> {
        otp_repository::create(self.txn, otp).await
    }

    pub async fn latest_outstanding(&self, email: &str, purpose: &str) -> AppResult<Option<Otp>> {
        otp_repository::latest_outstanding(self.txn, email, purpose).await
    }

    pub async fn record_attempt(&self, id: Uuid) -> AppResult<()> {
        otp_repository::record_attempt(self.txn, id).await
    }

    pub async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        otp_repository::consume(self.txn, id, now).await
    }
}
