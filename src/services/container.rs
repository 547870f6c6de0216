//! Service container: centralized access to the application services.
//!
//! Handlers depend on the `ServiceContainer` trait so router tests can swap
//! in a mock.

use std::sync::Arc;

use super::{
    AuthService, Authenticator, CompanyManager, CompanyService, DashboardBuilder, DashboardService,
    ExpenseManager, ExpenseService, Notifier, RuleManager, RuleService, UserManager, UserService,
};
use crate::config::Config;
use crate::domain::CurrencyConverter;
use crate::errors::AppResult;
use crate::infra::{Mailer, Persistence};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn users(&self) -> Arc<dyn UserService>;

    fn company(&self) -> Arc<dyn CompanyService>;

    fn expenses(&self) -> Arc<dyn ExpenseService>;

    fn rules(&self) -> Arc<dyn RuleService>;

    fn dashboard(&self) -> Arc<dyn DashboardService>;
}

/// Concrete implementation of ServiceContainer
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
    company_service: Arc<dyn CompanyService>,
    expense_service: Arc<dyn ExpenseService>,
    rule_service: Arc<dyn RuleService>,
    dashboard_service: Arc<dyn DashboardService>,
}

impl Services {
    /// Wire every service over one database connection.
    ///
    /// # Errors
    /// Fails when the configured exchange rate overrides are malformed.
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        config: Config,
        mailer: Arc<dyn Mailer>,
    ) -> AppResult<Self> {
        let converter = Arc::new(CurrencyConverter::with_overrides(
            config.exchange_rates.as_deref(),
        )?);
        let notifier = Notifier::new(mailer, config.mail_from.clone());
        let uow = Arc::new(Persistence::new(db));

        Ok(Self {
            auth_service: Arc::new(Authenticator::new(
                uow.clone(),
                config,
                converter.clone(),
                notifier.clone(),
            )),
            user_service: Arc::new(UserManager::new(uow.clone(), notifier.clone())),
            company_service: Arc::new(CompanyManager::new(uow.clone())),
            expense_service: Arc::new(ExpenseManager::new(uow.clone(), converter, notifier)),
            rule_service: Arc::new(RuleManager::new(uow.clone())),
            dashboard_service: Arc::new(DashboardBuilder::new(uow)),
        })
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    fn company(&self) -> Arc<dyn CompanyService> {
        self.company_service.clone()
    }

    fn expenses(&self) -> Arc<dyn ExpenseService> {
        self.expense_service.clone()
    }

    fn rules(&self) -> Arc<dyn RuleService> {
        self.rule_service.clone()
    }

    fn dashboard(&self) -> Arc<dyn DashboardService> {
        self.dashboard_service.clone()
    }
}
