//! E-mail notifications sent on behalf of the other services.
//!
//! Delivery problems are logged and swallowed: a failed e-mail never fails
//! the request that triggered it.

use std::sync::Arc;

use crate::domain::{Expense, ExpenseStatus, User};
use crate::infra::Mailer;
use crate::jobs::EmailJob;

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }

    async fn deliver(&self, job: EmailJob) {
        let to = job.to.clone();
        let subject = job.subject.clone();

        match self.mailer.send(job.with_from(self.from.clone())).await {
            Ok(()) => tracing::debug!(to = %to, subject = %subject, "Email handed to mailer"),
            Err(e) => tracing::warn!(to = %to, subject = %subject, error = %e, "Email delivery failed"),
        }
    }

    pub async fn welcome(&self, user: &User, company_name: &str) {
        let body = format!(
            "Hello {},\n\nAn account has been created for you at {} with the role {}.\n\
             Sign in with this e-mail address and the password your administrator gave you.",
            user.name, company_name, user.role
        );
        self.deliver(EmailJob::new(&user.email, "Your expense account", body))
            .await;
    }

    pub async fn password_reset_code(&self, email: &str, code: &str, ttl_minutes: i64) {
        let body = format!(
            "Your password reset code is {}.\n\nIt expires in {} minutes. \
             If you did not ask for a reset, ignore this message.",
            code, ttl_minutes
        );
        self.deliver(EmailJob::new(email, "Password reset code", body))
            .await;
    }

    pub async fn approval_requested(&self, approver: &User, expense: &Expense, submitter: &str) {
        let body = format!(
            "Hello {},\n\n{} submitted an expense that awaits your decision:\n\n\
             {} ({})\n{} {} on {}\n\nExpense id: {}",
            approver.name,
            submitter,
            expense.description,
            expense.category,
            expense.amount,
            expense.currency,
            expense.expense_date,
            expense.id
        );
        self.deliver(EmailJob::new(&approver.email, "Expense awaiting approval", body))
            .await;
    }

    pub async fn expense_decided(&self, owner: &User, expense: &Expense) {
        let verdict = match expense.status {
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
            _ => return,
        };

        let body = format!(
            "Hello {},\n\nYour expense \"{}\" ({} {}) has been {}.\n\nExpense id: {}",
            owner.name, expense.description, expense.amount, expense.currency, verdict, expense.id
        );
        self.deliver(EmailJob::new(&owner.email, format!("Expense {}", verdict), body))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;
    use crate::errors::AppError;
    use crate::infra::MockMailer;
    use crate::services::testing::user;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn expense(owner: &User, status: ExpenseStatus) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            company_id: owner.company_id,
            employee_id: owner.id,
            description: "Client dinner".to_string(),
            category: "Meals".to_string(),
            amount: Decimal::new(4250, 2),
            currency: "EUR".to_string(),
            company_amount: Decimal::new(4250, 2),
            expense_date: Utc::now().date_naive(),
            paid_by: None,
            remarks: None,
            status,
            rule_id: None,
            condition: None,
            submitted_at: None,
            decided_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn messages_carry_the_sender_address() {
        let owner = user(UserRole::Employee, Uuid::new_v4());
        let to = owner.email.clone();

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(move |job| {
                job.to == to
                    && job.from.as_deref() == Some("noreply@acme.example")
                    && job.subject == "Expense approved"
            })
            .times(1)
            .returning(|_| Ok(()));

        let notifier = Notifier::new(Arc::new(mailer), "noreply@acme.example");
        notifier
            .expense_decided(&owner, &expense(&owner, ExpenseStatus::Approved))
            .await;
    }

    #[tokio::test]
    async fn undecided_expenses_send_nothing() {
        let owner = user(UserRole::Employee, Uuid::new_v4());
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);

        let notifier = Notifier::new(Arc::new(mailer), "noreply@acme.example");
        for status in [ExpenseStatus::Draft, ExpenseStatus::Pending] {
            notifier.expense_decided(&owner, &expense(&owner, status)).await;
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(AppError::internal("smtp down")));

        let notifier = Notifier::new(Arc::new(mailer), "noreply@acme.example");
        notifier
            .password_reset_code("user@acme.example", "123456", 15)
            .await;
    }
}
