//! Dashboard aggregates, all amounts in the company currency.

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::expense::{Expense, ExpenseStatus};

/// Count and total of expenses in one status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusTotal {
    pub count: u64,
    #[schema(value_type = String, example = "1250.00")]
    pub amount: Decimal,
}

impl StatusTotal {
    fn add(&mut self, amount: Decimal) {
        self.count += 1;
        self.amount += amount;
    }
}

/// Per-status totals over a set of expenses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusTotals {
    pub draft: StatusTotal,
    pub pending: StatusTotal,
    pub approved: StatusTotal,
    pub rejected: StatusTotal,
}

impl StatusTotals {
    pub fn tally<'a, I>(expenses: I) -> Self
    where
        I: IntoIterator<Item = &'a Expense>,
    {
        let mut totals = Self::default();
        for expense in expenses {
            totals.bucket(expense.status).add(expense.company_amount);
        }
        totals
    }

    fn bucket(&mut self, status: ExpenseStatus) -> &mut StatusTotal {
        match status {
            ExpenseStatus::Draft => &mut self.draft,
            ExpenseStatus::Pending => &mut self.pending,
            ExpenseStatus::Approved => &mut self.approved,
            ExpenseStatus::Rejected => &mut self.rejected,
        }
    }

    pub fn count(&self) -> u64 {
        self.draft.count + self.pending.count + self.approved.count + self.rejected.count
    }
}

/// Dashboard for one user
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    #[schema(example = "INR")]
    pub currency: String,
    /// The caller's own claims
    pub mine: StatusTotals,
    /// Steps currently waiting for the caller's decision
    pub awaiting_my_approval: u64,
    /// Direct reports for managers, the whole company for admins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<StatusTotals>,
    /// Admins only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<StatusTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::str::FromStr;
    use uuid::Uuid;

    fn expense(status: ExpenseStatus, amount: &str) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            company_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            description: "Taxi".to_string(),
            category: "Travel".to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            currency: "USD".to_string(),
            company_amount: Decimal::from_str(amount).unwrap(),
            expense_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
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

    #[test]
    fn test_tally_groups_by_status() {
        let expenses = vec![
            expense(ExpenseStatus::Approved, "10.50"),
            expense(ExpenseStatus::Approved, "4.50"),
            expense(ExpenseStatus::Pending, "7.00"),
            expense(ExpenseStatus::Rejected, "1.25"),
        ];

        let totals = StatusTotals::tally(&expenses);
        assert_eq!(totals.approved.count, 2);
        assert_eq!(totals.approved.amount, Decimal::from_str("15.00").unwrap());
        assert_eq!(totals.pending.count, 1);
        assert_eq!(totals.rejected.amount, Decimal::from_str("1.25").unwrap());
        assert_eq!(totals.draft, StatusTotal::default());
        assert_eq!(totals.count(), 4);
    }

    #[test]
    fn test_tally_of_nothing_is_zero() {
        let totals = StatusTotals::tally(std::iter::empty());
        assert_eq!(totals.count(), 0);
        assert_eq!(totals.approved.amount, Decimal::ZERO);
    }
}
