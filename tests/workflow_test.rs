//! Service-level tests of the approval workflow over SQLite.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use expense_manager::config::Config;
use expense_manager::domain::{
    ApprovalCondition, Decision, ExpenseResponse, ExpenseStatus, RuleApprover, RuleDefinition,
    StepStatus, User, UserChanges, UserRole,
};
use expense_manager::errors::AppError;
use expense_manager::infra::{Database, LogMailer};
use expense_manager::services::{ExpenseDraft, NewMember, ServiceContainer, Services, Signup};

const SECRET: &str = "test-secret-key-for-testing-only-32chars";

struct Fixture {
    services: Services,
    admin: User,
}

impl Fixture {
    async fn new() -> Self {
        let database = Database::open("sqlite::memory:").await.unwrap();
        database.run_migrations().await.unwrap();

        let services = Services::from_connection(
            database.get_connection(),
            Config::for_database("sqlite::memory:", SECRET),
            Arc::new(LogMailer),
        )
        .unwrap();

        let admin = signup(&services, "admin@acme.example", "USD").await;
        Self { services, admin }
    }

    async fn member(&self, email: &str, role: UserRole, manager: Option<&User>) -> User {
        self.services
            .users()
            .create_user(
                &self.admin,
                NewMember {
                    name: email.to_string(),
                    email: email.to_string(),
                    password: "SecurePass123!".to_string(),
                    role,
                    manager_id: manager.map(|m| m.id),
                },
            )
            .await
            .unwrap()
    }

    async fn rule(&self, condition: ApprovalCondition, approvers: &[&User], sequential: bool) {
        self.services
            .rules()
            .create_rule(
                &self.admin,
                RuleDefinition {
                    name: "Default".to_string(),
                    description: None,
                    category: None,
                    user_id: None,
                    manager_first: false,
                    sequential,
                    condition,
                    approvers: approvers
                        .iter()
                        .map(|u| RuleApprover {
                            user_id: u.id,
                            required: false,
                        })
                        .collect(),
                },
            )
            .await
            .unwrap();
    }

    async fn submitted(&self, owner: &User, amount: &str) -> ExpenseResponse {
        let expenses = self.services.expenses();
        let draft = expenses
            .create_expense(
                owner,
                ExpenseDraft {
                    description: "Conference".to_string(),
                    category: "Travel".to_string(),
                    amount: Decimal::from_str(amount).unwrap(),
                    currency: "EUR".to_string(),
                    expense_date: NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
                    paid_by: Some("Card".to_string()),
                    remarks: None,
                },
            )
            .await
            .unwrap();

        expenses.submit_expense(owner, draft.id).await.unwrap()
    }
}

async fn signup(services: &Services, email: &str, currency: &str) -> User {
    let response = services
        .auth()
        .signup(Signup {
            company_name: "Acme".to_string(),
            country: "USA".to_string(),
            currency: currency.to_string(),
            name: "Admin".to_string(),
            email: email.to_string(),
            password: "SecurePass123!".to_string(),
        })
        .await
        .unwrap();

    services
        .auth()
        .authenticate(&response.token.access_token)
        .await
        .unwrap()
}

fn step_status(expense: &ExpenseResponse, approver: &User) -> StepStatus {
    expense
        .approvals
        .iter()
        .find(|s| s.approver_id == approver.id)
        .map(|s| s.status)
        .unwrap()
}

#[tokio::test]
async fn test_amount_is_converted_to_company_currency() {
    let fx = Fixture::new().await;
    let employee = fx.member("eve@acme.example", UserRole::Employee, None).await;

    let expense = fx.submitted(&employee, "92").await;

    // 92 EUR at 0.92 per USD
    assert_eq!(expense.company_amount, Decimal::from(100));
    assert_eq!(expense.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn test_percentage_rule_settles_once_threshold_is_met() {
    let fx = Fixture::new().await;
    let a = fx.member("a@acme.example", UserRole::Manager, None).await;
    let b = fx.member("b@acme.example", UserRole::Manager, None).await;
    let c = fx.member("c@acme.example", UserRole::Manager, None).await;
    let employee = fx.member("eve@acme.example", UserRole::Employee, None).await;
    fx.rule(ApprovalCondition::Percentage { percentage: 60 }, &[&a, &b, &c], false)
        .await;

    let expense = fx.submitted(&employee, "50").await;
    assert_eq!(expense.condition, Some(ApprovalCondition::Percentage { percentage: 60 }));
    assert!(expense.approvals.iter().all(|s| s.status == StepStatus::Pending));

    let expenses = fx.services.expenses();
    let after_a = expenses.approve(&a, expense.id, None).await.unwrap();
    assert_eq!(after_a.status, ExpenseStatus::Pending);

    let after_b = expenses.approve(&b, expense.id, None).await.unwrap();
    assert_eq!(after_b.status, ExpenseStatus::Approved);
    assert_eq!(step_status(&after_b, &c), StepStatus::Skipped);

    let err = expenses.approve(&c, expense.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_unreachable_threshold_rejects() {
    let fx = Fixture::new().await;
    let a = fx.member("a@acme.example", UserRole::Manager, None).await;
    let b = fx.member("b@acme.example", UserRole::Manager, None).await;
    let c = fx.member("c@acme.example", UserRole::Manager, None).await;
    let employee = fx.member("eve@acme.example", UserRole::Employee, None).await;
    fx.rule(ApprovalCondition::Percentage { percentage: 50 }, &[&a, &b, &c], false)
        .await;

    let expense = fx.submitted(&employee, "50").await;
    let expenses = fx.services.expenses();

    let after_a = expenses
        .reject(&a, expense.id, "No".to_string())
        .await
        .unwrap();
    assert_eq!(after_a.status, ExpenseStatus::Pending);

    let after_b = expenses
        .reject(&b, expense.id, "No".to_string())
        .await
        .unwrap();
    assert_eq!(after_b.status, ExpenseStatus::Rejected);
}

#[tokio::test]
async fn test_hybrid_rule_accepts_specific_approver() {
    let fx = Fixture::new().await;
    let a = fx.member("a@acme.example", UserRole::Manager, None).await;
    let b = fx.member("b@acme.example", UserRole::Manager, None).await;
    let c = fx.member("c@acme.example", UserRole::Manager, None).await;
    let employee = fx.member("eve@acme.example", UserRole::Employee, None).await;
    fx.rule(
        ApprovalCondition::Hybrid {
            percentage: 100,
            approver_id: c.id,
        },
        &[&a, &b, &c],
        true,
    )
    .await;

    let expense = fx.submitted(&employee, "50").await;
    assert_eq!(step_status(&expense, &a), StepStatus::Pending);
    assert_eq!(step_status(&expense, &c), StepStatus::Waiting);

    let expenses = fx.services.expenses();
    expenses.approve(&a, expense.id, None).await.unwrap();
    let after_b = expenses
        .reject(&b, expense.id, "Too pricey".to_string())
        .await
        .unwrap();
    assert_eq!(after_b.status, ExpenseStatus::Pending);
    assert_eq!(step_status(&after_b, &c), StepStatus::Pending);

    let after_c = expenses.approve(&c, expense.id, None).await.unwrap();
    assert_eq!(after_c.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn test_rule_changes_do_not_touch_submitted_expenses() {
    let fx = Fixture::new().await;
    let a = fx.member("a@acme.example", UserRole::Manager, None).await;
    let b = fx.member("b@acme.example", UserRole::Manager, None).await;
    let employee = fx.member("eve@acme.example", UserRole::Employee, None).await;
    fx.rule(ApprovalCondition::Percentage { percentage: 50 }, &[&a, &b], false)
        .await;

    let expense = fx.submitted(&employee, "50").await;

    let rules = fx.services.rules();
    for rule in rules.list_rules(&fx.admin).await.unwrap() {
        rules.delete_rule(&fx.admin, rule.id).await.unwrap();
    }

    let decided = fx
        .services
        .expenses()
        .approve(&a, expense.id, None)
        .await
        .unwrap();
    assert_eq!(decided.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn test_override_needs_admin_and_pending_expense() {
    let fx = Fixture::new().await;
    let manager = fx.member("m@acme.example", UserRole::Manager, None).await;
    let employee = fx
        .member("eve@acme.example", UserRole::Employee, Some(&manager))
        .await;

    let expense = fx.submitted(&employee, "10").await;
    let expenses = fx.services.expenses();

    let err = expenses
        .override_decision(&manager, expense.id, Decision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let settled = expenses
        .override_decision(&fx.admin, expense.id, Decision::Approve, Some("Urgent".to_string()))
        .await
        .unwrap();
    assert_eq!(settled.status, ExpenseStatus::Approved);
    assert!(settled.approvals[0]
        .comment
        .as_deref()
        .is_some_and(|c| c.contains("Urgent")));

    let err = expenses
        .override_decision(&fx.admin, expense.id, Decision::Reject, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_reporting_cycles_are_refused() {
    let fx = Fixture::new().await;
    let top = fx.member("top@acme.example", UserRole::Manager, None).await;
    let middle = fx
        .member("middle@acme.example", UserRole::Manager, Some(&top))
        .await;

    let err = fx
        .services
        .users()
        .update_user(
            &fx.admin,
            top.id,
            UserChanges {
                manager_id: Some(Some(middle.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_admin_cannot_change_own_role() {
    let fx = Fixture::new().await;

    let err = fx
        .services
        .users()
        .update_user(
            &fx.admin,
            fx.admin.id,
            UserChanges {
                role: Some(UserRole::Employee),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_approvers_in_use_cannot_be_removed() {
    let fx = Fixture::new().await;
    let a = fx.member("a@acme.example", UserRole::Manager, None).await;
    let b = fx.member("b@acme.example", UserRole::Manager, None).await;
    let employee = fx.member("eve@acme.example", UserRole::Employee, None).await;
    fx.rule(ApprovalCondition::All, &[&a, &b], false).await;

    let users = fx.services.users();
    let demote = || UserChanges {
        role: Some(UserRole::Employee),
        ..Default::default()
    };

    // Listed on a rule
    let err = users.delete_user(&fx.admin, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    let err = users.update_user(&fx.admin, b.id, demote()).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let expense = fx.submitted(&employee, "50").await;
    let rules = fx.services.rules();
    for rule in rules.list_rules(&fx.admin).await.unwrap() {
        rules.delete_rule(&fx.admin, rule.id).await.unwrap();
    }

    // Off every rule, but still holding an open step
    let err = users.delete_user(&fx.admin, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let expenses = fx.services.expenses();
    let pending = expenses.approve(&a, expense.id, None).await.unwrap();
    assert_eq!(pending.status, ExpenseStatus::Pending);
    assert_eq!(step_status(&pending, &b), StepStatus::Pending);

    let settled = expenses
        .override_decision(&fx.admin, expense.id, Decision::Approve, None)
        .await
        .unwrap();
    assert_eq!(settled.status, ExpenseStatus::Approved);

    users.delete_user(&fx.admin, b.id).await.unwrap();
    let demoted = users.update_user(&fx.admin, a.id, demote()).await.unwrap();
    assert_eq!(demoted.role, UserRole::Employee);
}

#[tokio::test]
async fn test_companies_are_isolated() {
    let fx = Fixture::new().await;
    let employee = fx.member("eve@acme.example", UserRole::Employee, None).await;
    let expense = fx.submitted(&employee, "10").await;

    let other_admin = signup(&fx.services, "boss@other.example", "EUR").await;

    let err = fx
        .services
        .expenses()
        .get_expense(&other_admin, expense.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = fx
        .services
        .users()
        .get_user(&other_admin, employee.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}
