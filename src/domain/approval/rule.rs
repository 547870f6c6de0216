//! Approval rules: who approves which expenses, in what order, and when the
//! collected decisions are enough.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

const CONDITION_ALL: &str = "all";
const CONDITION_PERCENTAGE: &str = "percentage";
const CONDITION_SPECIFIC_APPROVER: &str = "specific_approver";
const CONDITION_HYBRID: &str = "hybrid";

/// When a chain of decisions approves an expense.
///
/// Required approvers are checked on top of the condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalCondition {
    /// Every approver on the chain approves
    #[default]
    All,
    /// At least `percentage` percent of the chain approves
    Percentage { percentage: u8 },
    /// Approval by this user settles the expense
    SpecificApprover { approver_id: Uuid },
    /// Either the percentage is reached or the specific approver approves
    Hybrid { percentage: u8, approver_id: Uuid },
}

impl ApprovalCondition {
    pub fn kind(&self) -> &'static str {
        match self {
            ApprovalCondition::All => CONDITION_ALL,
            ApprovalCondition::Percentage { .. } => CONDITION_PERCENTAGE,
            ApprovalCondition::SpecificApprover { .. } => CONDITION_SPECIFIC_APPROVER,
            ApprovalCondition::Hybrid { .. } => CONDITION_HYBRID,
        }
    }

    pub fn percentage(&self) -> Option<u8> {
        match self {
            ApprovalCondition::Percentage { percentage }
            | ApprovalCondition::Hybrid { percentage, .. } => Some(*percentage),
            _ => None,
        }
    }

    pub fn specific_approver(&self) -> Option<Uuid> {
        match self {
            ApprovalCondition::SpecificApprover { approver_id }
            | ApprovalCondition::Hybrid { approver_id, .. } => Some(*approver_id),
            _ => None,
        }
    }

    /// Rebuild from its stored columns.
    pub fn from_parts(
        kind: &str,
        percentage: Option<i32>,
        approver_id: Option<Uuid>,
    ) -> AppResult<Self> {
        let percentage = || {
            percentage
                .and_then(|p| u8::try_from(p).ok())
                .ok_or_else(|| AppError::internal(format!("Rule condition '{}' lacks a percentage", kind)))
        };
        let approver = || {
            approver_id
                .ok_or_else(|| AppError::internal(format!("Rule condition '{}' lacks an approver", kind)))
        };

        let condition = match kind {
            CONDITION_ALL => ApprovalCondition::All,
            CONDITION_PERCENTAGE => ApprovalCondition::Percentage {
                percentage: percentage()?,
            },
            CONDITION_SPECIFIC_APPROVER => ApprovalCondition::SpecificApprover {
                approver_id: approver()?,
            },
            CONDITION_HYBRID => ApprovalCondition::Hybrid {
                percentage: percentage()?,
                approver_id: approver()?,
            },
            other => {
                return Err(AppError::internal(format!(
                    "Unknown rule condition '{}'",
                    other
                )))
            }
        };

        Ok(condition)
    }

    /// Percentage must be 1..=100.
    pub fn validate(&self) -> AppResult<()> {
        match self.percentage() {
            Some(p) if p == 0 || p > 100 => Err(AppError::validation(
                "Minimum approval percentage must be between 1 and 100",
            )),
            _ => Ok(()),
        }
    }
}

/// One approver listed on a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RuleApprover {
    pub user_id: Uuid,
    /// Approval is mandatory and a rejection rejects the expense
    #[serde(default)]
    pub required: bool,
}

/// Approval rule domain entity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApprovalRule {
    pub id: Uuid,
    pub company_id: Uuid,
    #[schema(example = "Travel over budget")]
    pub name: String,
    pub description: Option<String>,
    /// Expense category the rule applies to (any category when absent)
    #[schema(example = "Travel")]
    pub category: Option<String>,
    /// Submitting employee the rule applies to (anyone when absent)
    pub user_id: Option<Uuid>,
    /// The submitter's manager approves first
    pub manager_first: bool,
    /// Approvers act one after another instead of all at once
    pub sequential: bool,
    pub condition: ApprovalCondition,
    /// Approvers in the order they act
    pub approvers: Vec<RuleApprover>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rule contents as written by an admin
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub user_id: Option<Uuid>,
    pub manager_first: bool,
    pub sequential: bool,
    pub condition: ApprovalCondition,
    pub approvers: Vec<RuleApprover>,
}

impl RuleDefinition {
    /// Structural checks that need no database access.
    pub fn validate(&self) -> AppResult<()> {
        self.condition.validate()?;

        if self.approvers.is_empty() && !self.manager_first {
            return Err(AppError::validation(
                "A rule needs at least one approver or the manager as approver",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        if !self.approvers.iter().all(|a| seen.insert(a.user_id)) {
            return Err(AppError::validation("Approvers must be distinct"));
        }

        if let Some(approver) = self.condition.specific_approver() {
            if !seen.contains(&approver) {
                return Err(AppError::validation(
                    "The specific approver must be one of the rule's approvers",
                ));
            }
        }

        if let Some(category) = &self.category {
            if category.trim().is_empty() {
                return Err(AppError::validation("Category cannot be blank"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(condition: ApprovalCondition, approvers: Vec<RuleApprover>) -> RuleDefinition {
        RuleDefinition {
            name: "Rule".to_string(),
            description: None,
            category: None,
            user_id: None,
            manager_first: false,
            sequential: false,
            condition,
            approvers,
        }
    }

    #[test]
    fn test_condition_parts_round_trip() {
        let approver = Uuid::new_v4();
        let conditions = [
            ApprovalCondition::All,
            ApprovalCondition::Percentage { percentage: 60 },
            ApprovalCondition::SpecificApprover { approver_id: approver },
            ApprovalCondition::Hybrid { percentage: 60, approver_id: approver },
        ];

        for condition in conditions {
            let restored = ApprovalCondition::from_parts(
                condition.kind(),
                condition.percentage().map(i32::from),
                condition.specific_approver(),
            )
            .unwrap();
            assert_eq!(restored, condition);
        }
    }

    #[test]
    fn test_condition_parts_missing_fields() {
        assert!(ApprovalCondition::from_parts("percentage", None, None).is_err());
        assert!(ApprovalCondition::from_parts("hybrid", Some(50), None).is_err());
        assert!(ApprovalCondition::from_parts("majority", None, None).is_err());
    }

    #[test]
    fn test_condition_serde_shape() {
        let json = serde_json::to_value(ApprovalCondition::Percentage { percentage: 60 }).unwrap();
        assert_eq!(json["type"], "percentage");
        assert_eq!(json["percentage"], 60);

        let parsed: ApprovalCondition = serde_json::from_str(r#"{"type":"all"}"#).unwrap();
        assert_eq!(parsed, ApprovalCondition::All);
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(ApprovalCondition::Percentage { percentage: 0 }.validate().is_err());
        assert!(ApprovalCondition::Percentage { percentage: 101 }.validate().is_err());
        assert!(ApprovalCondition::Percentage { percentage: 100 }.validate().is_ok());
    }

    #[test]
    fn test_definition_requires_approvers() {
        let rule = definition(ApprovalCondition::All, vec![]);
        assert!(rule.validate().is_err());

        let rule = RuleDefinition {
            manager_first: true,
            ..definition(ApprovalCondition::All, vec![])
        };
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_definition_rejects_duplicate_approvers() {
        let id = Uuid::new_v4();
        let rule = definition(
            ApprovalCondition::All,
            vec![
                RuleApprover { user_id: id, required: false },
                RuleApprover { user_id: id, required: true },
            ],
        );
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_specific_approver_must_be_listed() {
        let listed = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let approvers = vec![RuleApprover { user_id: listed, required: false }];

        let ok = definition(
            ApprovalCondition::SpecificApprover { approver_id: listed },
            approvers.clone(),
        );
        assert!(ok.validate().is_ok());

        let bad = definition(
            ApprovalCondition::Hybrid { percentage: 50, approver_id: outsider },
            approvers,
        );
        assert!(bad.validate().is_err());
    }
}
