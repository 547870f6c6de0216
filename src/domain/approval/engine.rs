//! Approval engine: rule selection, chain construction and decision evaluation.
//!
//! Everything here is pure; services load the chain, call into the engine and
//! persist the mutated steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::rule::{ApprovalCondition, ApprovalRule};
use crate::domain::expense::normalize_category;
use crate::errors::{AppError, AppResult};

/// State of a single approval step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not yet this approver's turn
    Waiting,
    /// Awaiting this approver's decision
    Pending,
    Approved,
    Rejected,
    /// Closed without a decision because the expense was settled
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Waiting => "waiting",
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Waiting or pending
    pub fn is_open(&self) -> bool {
        matches!(self, StepStatus::Waiting | StepStatus::Pending)
    }
}

impl From<&str> for StepStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => StepStatus::Pending,
            "approved" => StepStatus::Approved,
            "rejected" => StepStatus::Rejected,
            "skipped" => StepStatus::Skipped,
            _ => StepStatus::Waiting,
        }
    }
}

/// One approver's slot in an expense's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    /// Position in the chain, unique per expense
    pub sequence: i32,
    /// Steps sharing a stage are pending at the same time
    pub stage: i32,
    pub required: bool,
    pub status: StepStatus,
    pub comment: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
}

/// An approver's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Where an expense stands after evaluating its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Approved,
    Rejected,
}

impl Outcome {
    pub fn is_final(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}

/// Result of applying a decision to a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Approvers whose steps became pending as a consequence
    pub newly_pending: Vec<Uuid>,
}

/// Everything needed to evaluate a chain, captured at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPolicy {
    pub condition: ApprovalCondition,
}

impl ChainPolicy {
    /// Policy for a built chain. A specific approver missing from the chain
    /// (typically because they submitted the expense) cannot settle it, so the
    /// condition falls back to its remaining part.
    pub fn for_chain(condition: ApprovalCondition, chain: &[ApprovalStep]) -> Self {
        let on_chain = |id: Uuid| chain.iter().any(|s| s.approver_id == id);

        let condition = match condition {
            ApprovalCondition::SpecificApprover { approver_id } if !on_chain(approver_id) => {
                ApprovalCondition::All
            }
            ApprovalCondition::Hybrid {
                percentage,
                approver_id,
            } if !on_chain(approver_id) => ApprovalCondition::Percentage { percentage },
            other => other,
        };

        Self { condition }
    }
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            condition: ApprovalCondition::All,
        }
    }
}

/// Pick the rule governing an expense.
///
/// Precedence: user + category, user only, category only, default rule.
/// Ties go to the oldest rule.
pub fn select_rule<'a>(
    rules: &'a [ApprovalRule],
    employee_id: Uuid,
    category: &str,
) -> Option<&'a ApprovalRule> {
    let category = normalize_category(category);

    rules
        .iter()
        .filter_map(|rule| match_tier(rule, employee_id, &category).map(|tier| (tier, rule)))
        .min_by(|(ta, a), (tb, b)| {
            ta.cmp(tb)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        })
        .map(|(_, rule)| rule)
}

fn match_tier(rule: &ApprovalRule, employee_id: Uuid, category: &str) -> Option<u8> {
    let category_match = rule
        .category
        .as_deref()
        .map(|c| normalize_category(c) == category);

    match (rule.user_id, category_match) {
        (Some(user), Some(true)) if user == employee_id => Some(0),
        (Some(user), None) if user == employee_id => Some(1),
        (None, Some(true)) => Some(2),
        (None, None) => Some(3),
        _ => None,
    }
}

/// Build the approval chain for an expense.
///
/// Without a rule the submitter's manager approves alone. The submitter never
/// approves their own expense and an approver appears at most once.
pub fn build_chain(
    expense_id: Uuid,
    rule: Option<&ApprovalRule>,
    submitter_id: Uuid,
    manager_id: Option<Uuid>,
) -> Vec<ApprovalStep> {
    let manager_first = rule.map_or(true, |r| r.manager_first);
    let sequential = rule.map_or(true, |r| r.sequential);

    let mut planned: Vec<(Uuid, bool)> = Vec::new();
    let mut push = |approver: Uuid, required: bool| {
        if approver == submitter_id {
            return;
        }
        match planned.iter_mut().find(|(id, _)| *id == approver) {
            Some(existing) => existing.1 |= required,
            None => planned.push((approver, required)),
        }
    };

    let manager = manager_id.filter(|_| manager_first);
    if let Some(manager) = manager {
        push(manager, true);
    }
    if let Some(rule) = rule {
        for approver in &rule.approvers {
            push(approver.user_id, approver.required);
        }
    }

    let has_manager_gate = manager.is_some_and(|m| m != submitter_id);

    planned
        .into_iter()
        .enumerate()
        .map(|(index, (approver_id, required))| {
            let sequence = index as i32;
            let stage = if sequential {
                sequence
            } else if has_manager_gate && index > 0 {
                1
            } else {
                0
            };

            ApprovalStep {
                id: Uuid::new_v4(),
                expense_id,
                approver_id,
                sequence,
                stage,
                required,
                status: StepStatus::Waiting,
                comment: None,
                acted_at: None,
            }
        })
        .collect()
}

/// Open the earliest stage that still has undecided steps.
///
/// Returns the approvers whose steps moved from waiting to pending.
pub fn activate(chain: &mut [ApprovalStep]) -> Vec<Uuid> {
    let Some(stage) = chain
        .iter()
        .filter(|s| s.status.is_open())
        .map(|s| s.stage)
        .min()
    else {
        return Vec::new();
    };

    chain
        .iter_mut()
        .filter(|s| s.stage == stage && s.status == StepStatus::Waiting)
        .map(|s| {
            s.status = StepStatus::Pending;
            s.approver_id
        })
        .collect()
}

/// Evaluate a chain against its policy.
pub fn evaluate(chain: &[ApprovalStep], policy: &ChainPolicy) -> Outcome {
    if chain.is_empty() {
        return Outcome::Approved;
    }

    if chain
        .iter()
        .any(|s| s.required && s.status == StepStatus::Rejected)
    {
        return Outcome::Rejected;
    }

    let approved = |s: &ApprovalStep| s.status == StepStatus::Approved;
    if settles(chain, &policy.condition, approved) {
        return Outcome::Approved;
    }

    // Treat every undecided step as a future approval: if even that cannot
    // settle the expense, it can never be approved.
    let optimistic = |s: &ApprovalStep| s.status == StepStatus::Approved || s.status.is_open();
    if !settles(chain, &policy.condition, optimistic) {
        return Outcome::Rejected;
    }

    Outcome::Pending
}

/// Whether the steps counted by `counts` satisfy the condition and every
/// required step.
fn settles<F>(chain: &[ApprovalStep], condition: &ApprovalCondition, counts: F) -> bool
where
    F: Fn(&ApprovalStep) -> bool,
{
    let required_ok = chain.iter().filter(|s| s.required).all(&counts);
    if !required_ok {
        return false;
    }

    let total = chain.len();
    let approved = chain.iter().filter(|s| counts(s)).count();
    let percentage_met = |p: u8| approved * 100 >= usize::from(p) * total;
    let approver_met = |id: Uuid| chain.iter().any(|s| s.approver_id == id && counts(s));

    match *condition {
        ApprovalCondition::All => approved == total,
        ApprovalCondition::Percentage { percentage } => percentage_met(percentage),
        ApprovalCondition::SpecificApprover { approver_id } => approver_met(approver_id),
        ApprovalCondition::Hybrid {
            percentage,
            approver_id,
        } => percentage_met(percentage) || approver_met(approver_id),
    }
}

/// Close every undecided step.
fn skip_open(chain: &mut [ApprovalStep]) {
    for step in chain.iter_mut().filter(|s| s.status.is_open()) {
        step.status = StepStatus::Skipped;
    }
}

/// Prepare a freshly built chain: settle it at once when possible, otherwise
/// open the first stage.
pub fn start(chain: &mut [ApprovalStep], policy: &ChainPolicy) -> Resolution {
    let outcome = evaluate(chain, policy);
    if outcome.is_final() {
        skip_open(chain);
        return Resolution {
            outcome,
            newly_pending: Vec::new(),
        };
    }

    Resolution {
        outcome,
        newly_pending: activate(chain),
    }
}

/// Record `approver_id`'s decision and advance the chain.
pub fn decide(
    chain: &mut [ApprovalStep],
    policy: &ChainPolicy,
    approver_id: Uuid,
    decision: Decision,
    comment: Option<String>,
    now: DateTime<Utc>,
) -> AppResult<Resolution> {
    let step = match chain
        .iter()
        .position(|s| s.approver_id == approver_id && s.status == StepStatus::Pending)
    {
        Some(idx) => &mut chain[idx],
        None if chain.iter().any(|s| s.approver_id == approver_id) => {
            return Err(AppError::invalid_state(
                "This expense is not awaiting your decision",
            ))
        }
        None => return Err(AppError::Forbidden),
    };

    step.status = match decision {
        Decision::Approve => StepStatus::Approved,
        Decision::Reject => StepStatus::Rejected,
    };
    step.comment = comment;
    step.acted_at = Some(now);

    let outcome = evaluate(chain, policy);
    if outcome.is_final() {
        skip_open(chain);
        return Ok(Resolution {
            outcome,
            newly_pending: Vec::new(),
        });
    }

    Ok(Resolution {
        outcome,
        newly_pending: activate(chain),
    })
}

/// Force a final outcome, closing every undecided step.
pub fn override_chain(chain: &mut [ApprovalStep], decision: Decision) -> Outcome {
    skip_open(chain);
    match decision {
        Decision::Approve => Outcome::Approved,
        Decision::Reject => Outcome::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::approval::RuleApprover;
    use chrono::Duration;

    fn rule(
        category: Option<&str>,
        user_id: Option<Uuid>,
        approvers: Vec<RuleApprover>,
        sequential: bool,
        manager_first: bool,
        condition: ApprovalCondition,
    ) -> ApprovalRule {
        ApprovalRule {
            id: Uuid::new_v4(),
            company_id: Uuid::nil(),
            name: "rule".to_string(),
            description: None,
            category: category.map(str::to_string),
            user_id,
            manager_first,
            sequential,
            condition,
            approvers,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn approver(user_id: Uuid, required: bool) -> RuleApprover {
        RuleApprover { user_id, required }
    }

    fn policy(condition: ApprovalCondition) -> ChainPolicy {
        ChainPolicy { condition }
    }

    fn statuses(chain: &[ApprovalStep]) -> Vec<StepStatus> {
        chain.iter().map(|s| s.status).collect()
    }

    // -------------------------------------------------------------------------
    // Rule selection
    // -------------------------------------------------------------------------

    #[test]
    fn test_select_rule_precedence() {
        let employee = Uuid::new_v4();
        let default_rule = rule(None, None, vec![], true, true, ApprovalCondition::All);
        let category_rule = rule(Some("Travel"), None, vec![], true, true, ApprovalCondition::All);
        let user_rule = rule(None, Some(employee), vec![], true, true, ApprovalCondition::All);
        let user_category_rule = rule(
            Some("travel"),
            Some(employee),
            vec![],
            true,
            true,
            ApprovalCondition::All,
        );

        let all = vec![
            default_rule.clone(),
            category_rule.clone(),
            user_rule.clone(),
            user_category_rule.clone(),
        ];

        assert_eq!(select_rule(&all, employee, " TRAVEL ").unwrap().id, user_category_rule.id);
        assert_eq!(select_rule(&all, employee, "Food").unwrap().id, user_rule.id);
        assert_eq!(select_rule(&all, Uuid::new_v4(), "travel").unwrap().id, category_rule.id);
        assert_eq!(select_rule(&all, Uuid::new_v4(), "food").unwrap().id, default_rule.id);
    }

    #[test]
    fn test_select_rule_ignores_other_users_and_categories() {
        let employee = Uuid::new_v4();
        let rules = vec![
            rule(Some("travel"), None, vec![], true, true, ApprovalCondition::All),
            rule(None, Some(Uuid::new_v4()), vec![], true, true, ApprovalCondition::All),
            rule(Some("food"), Some(employee), vec![], true, true, ApprovalCondition::All),
        ];

        assert!(select_rule(&rules, employee, "office").is_none());
        assert!(select_rule(&[], employee, "office").is_none());
    }

    #[test]
    fn test_select_rule_tie_goes_to_oldest() {
        let mut older = rule(Some("food"), None, vec![], true, true, ApprovalCondition::All);
        let newer = rule(Some("food"), None, vec![], true, true, ApprovalCondition::All);
        older.created_at = newer.created_at - Duration::days(1);

        let rules = vec![newer, older.clone()];
        assert_eq!(select_rule(&rules, Uuid::new_v4(), "food").unwrap().id, older.id);
    }

    // -------------------------------------------------------------------------
    // Chain construction
    // -------------------------------------------------------------------------

    #[test]
    fn test_chain_without_rule_is_manager_only() {
        let (submitter, manager) = (Uuid::new_v4(), Uuid::new_v4());
        let chain = build_chain(Uuid::new_v4(), None, submitter, Some(manager));

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].approver_id, manager);
        assert!(chain[0].required);

        assert!(build_chain(Uuid::new_v4(), None, submitter, None).is_empty());
    }

    #[test]
    fn test_chain_manager_first_then_rule_approvers() {
        let (submitter, manager, finance, director) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(finance, false), approver(director, true)],
            true,
            true,
            ApprovalCondition::All,
        );

        let chain = build_chain(Uuid::new_v4(), Some(&r), submitter, Some(manager));
        let ids: Vec<Uuid> = chain.iter().map(|s| s.approver_id).collect();
        assert_eq!(ids, vec![manager, finance, director]);
        assert_eq!(chain.iter().map(|s| s.stage).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(chain.iter().map(|s| s.required).collect::<Vec<_>>(), vec![true, false, true]);
    }

    #[test]
    fn test_chain_parallel_stages() {
        let (submitter, manager, a, b) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let with_manager = rule(
            None,
            None,
            vec![approver(a, false), approver(b, false)],
            false,
            true,
            ApprovalCondition::All,
        );
        let chain = build_chain(Uuid::new_v4(), Some(&with_manager), submitter, Some(manager));
        assert_eq!(chain.iter().map(|s| s.stage).collect::<Vec<_>>(), vec![0, 1, 1]);

        let without_manager = ApprovalRule { manager_first: false, ..with_manager };
        let chain = build_chain(Uuid::new_v4(), Some(&without_manager), submitter, Some(manager));
        assert_eq!(chain.iter().map(|s| s.stage).collect::<Vec<_>>(), vec![0, 0]);
    }

    #[test]
    fn test_chain_skips_submitter_and_merges_duplicates() {
        let (submitter, manager, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(submitter, true), approver(manager, false), approver(other, false)],
            true,
            true,
            ApprovalCondition::All,
        );

        let chain = build_chain(Uuid::new_v4(), Some(&r), submitter, Some(manager));
        let ids: Vec<Uuid> = chain.iter().map(|s| s.approver_id).collect();
        assert_eq!(ids, vec![manager, other]);
        assert!(chain[0].required);
        assert_eq!(chain.iter().map(|s| s.sequence).collect::<Vec<_>>(), vec![0, 1]);
    }

    // -------------------------------------------------------------------------
    // Activation and decisions
    // -------------------------------------------------------------------------

    #[test]
    fn test_empty_chain_approves_on_start() {
        let mut chain = Vec::new();
        let resolution = start(&mut chain, &ChainPolicy::default());
        assert_eq!(resolution.outcome, Outcome::Approved);
    }

    #[test]
    fn test_sequential_chain_hands_over_in_order() {
        let (submitter, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(a, false), approver(b, false), approver(c, false)],
            true,
            false,
            ApprovalCondition::All,
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);

        let started = start(&mut chain, &p);
        assert_eq!(started.newly_pending, vec![a]);
        assert_eq!(
            statuses(&chain),
            vec![StepStatus::Pending, StepStatus::Waiting, StepStatus::Waiting]
        );

        // b cannot act before a
        let err = decide(&mut chain, &p, b, Decision::Approve, None, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let r1 = decide(&mut chain, &p, a, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r1.outcome, Outcome::Pending);
        assert_eq!(r1.newly_pending, vec![b]);

        let r2 = decide(&mut chain, &p, b, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r2.newly_pending, vec![c]);

        let r3 = decide(&mut chain, &p, c, Decision::Approve, Some("ok".into()), Utc::now()).unwrap();
        assert_eq!(r3.outcome, Outcome::Approved);
        assert_eq!(chain[2].comment.as_deref(), Some("ok"));
    }

    #[test]
    fn test_all_condition_rejects_on_any_rejection() {
        let (submitter, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(a, false), approver(b, false)],
            false,
            false,
            ApprovalCondition::All,
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        let started = start(&mut chain, &p);
        assert_eq!(started.newly_pending.len(), 2);

        let resolution = decide(&mut chain, &p, b, Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(resolution.outcome, Outcome::Rejected);
        assert_eq!(chain[0].status, StepStatus::Skipped);
    }

    #[test]
    fn test_percentage_condition_settles_early() {
        let submitter = Uuid::new_v4();
        let approvers: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let r = rule(
            None,
            None,
            approvers.iter().map(|id| approver(*id, false)).collect(),
            false,
            false,
            ApprovalCondition::Percentage { percentage: 60 },
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);

        // One rejection still leaves 4/5 reachable
        let r1 = decide(&mut chain, &p, approvers[0], Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(r1.outcome, Outcome::Pending);

        decide(&mut chain, &p, approvers[1], Decision::Approve, None, Utc::now()).unwrap();
        let r2 = decide(&mut chain, &p, approvers[2], Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r2.outcome, Outcome::Pending);

        // 3 of 5 = 60%
        let r3 = decide(&mut chain, &p, approvers[3], Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r3.outcome, Outcome::Approved);
        assert_eq!(chain[4].status, StepStatus::Skipped);
    }

    #[test]
    fn test_percentage_condition_rejects_when_unreachable() {
        let submitter = Uuid::new_v4();
        let approvers: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let r = rule(
            None,
            None,
            approvers.iter().map(|id| approver(*id, false)).collect(),
            false,
            false,
            ApprovalCondition::Percentage { percentage: 60 },
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);

        let r1 = decide(&mut chain, &p, approvers[0], Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(r1.outcome, Outcome::Pending);

        // Two rejections out of three: at most 33% reachable
        let r2 = decide(&mut chain, &p, approvers[1], Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(r2.outcome, Outcome::Rejected);
    }

    #[test]
    fn test_specific_approver_auto_approves() {
        let (submitter, clerk, cfo) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(clerk, false), approver(cfo, false)],
            false,
            false,
            ApprovalCondition::SpecificApprover { approver_id: cfo },
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);

        let resolution = decide(&mut chain, &p, cfo, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(resolution.outcome, Outcome::Approved);
        assert_eq!(chain[0].status, StepStatus::Skipped);
    }

    #[test]
    fn test_specific_approver_rejection_is_final() {
        let (submitter, clerk, cfo) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(clerk, false), approver(cfo, false)],
            false,
            false,
            ApprovalCondition::SpecificApprover { approver_id: cfo },
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);

        // Clerk approving alone cannot settle it
        let r1 = decide(&mut chain, &p, clerk, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r1.outcome, Outcome::Pending);

        let r2 = decide(&mut chain, &p, cfo, Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(r2.outcome, Outcome::Rejected);
    }

    #[test]
    fn test_hybrid_either_branch_approves() {
        let submitter = Uuid::new_v4();
        let cfo = Uuid::new_v4();
        let others: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut listed: Vec<RuleApprover> = others.iter().map(|id| approver(*id, false)).collect();
        listed.push(approver(cfo, false));
        let r = rule(
            None,
            None,
            listed,
            false,
            false,
            ApprovalCondition::Hybrid { percentage: 60, approver_id: cfo },
        );
        let p = policy(r.condition);

        // CFO branch
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);
        let resolution = decide(&mut chain, &p, cfo, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(resolution.outcome, Outcome::Approved);

        // Percentage branch: 3 of 5 while the CFO rejects
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);
        decide(&mut chain, &p, cfo, Decision::Reject, None, Utc::now()).unwrap();
        decide(&mut chain, &p, others[0], Decision::Approve, None, Utc::now()).unwrap();
        decide(&mut chain, &p, others[1], Decision::Approve, None, Utc::now()).unwrap();
        let resolution =
            decide(&mut chain, &p, others[2], Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(resolution.outcome, Outcome::Approved);
    }

    #[test]
    fn test_required_approver_gates_and_vetoes() {
        let (submitter, cfo, director, clerk) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(clerk, false), approver(director, true), approver(cfo, false)],
            false,
            false,
            ApprovalCondition::SpecificApprover { approver_id: cfo },
        );
        let p = policy(r.condition);

        // The specific approver alone is not enough while a required step is open
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);
        let r1 = decide(&mut chain, &p, cfo, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r1.outcome, Outcome::Pending);
        let r2 = decide(&mut chain, &p, director, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r2.outcome, Outcome::Approved);

        // A required rejection is a veto
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);
        let r3 = decide(&mut chain, &p, director, Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(r3.outcome, Outcome::Rejected);
    }

    #[test]
    fn test_sequential_non_required_rejection_passes_turn() {
        let (submitter, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(a, false), approver(b, false), approver(c, false)],
            true,
            false,
            ApprovalCondition::Percentage { percentage: 50 },
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);

        let r1 = decide(&mut chain, &p, a, Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(r1.outcome, Outcome::Pending);
        assert_eq!(r1.newly_pending, vec![b]);

        decide(&mut chain, &p, b, Decision::Approve, None, Utc::now()).unwrap();
        let r3 = decide(&mut chain, &p, c, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(r3.outcome, Outcome::Approved);
    }

    #[test]
    fn test_manager_gate_in_parallel_mode() {
        let (submitter, manager, a, b) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(a, false), approver(b, false)],
            false,
            true,
            ApprovalCondition::All,
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, Some(manager));

        let started = start(&mut chain, &p);
        assert_eq!(started.newly_pending, vec![manager]);

        let resolution =
            decide(&mut chain, &p, manager, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(resolution.newly_pending, vec![a, b]);

        // Manager is required: their rejection ends it
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, Some(manager));
        start(&mut chain, &p);
        let resolution =
            decide(&mut chain, &p, manager, Decision::Reject, None, Utc::now()).unwrap();
        assert_eq!(resolution.outcome, Outcome::Rejected);
        assert_eq!(statuses(&chain)[1..], [StepStatus::Skipped, StepStatus::Skipped]);
    }

    #[test]
    fn test_outsider_cannot_decide() {
        let (submitter, a) = (Uuid::new_v4(), Uuid::new_v4());
        let mut chain = build_chain(Uuid::new_v4(), None, submitter, Some(a));
        let p = ChainPolicy::default();
        start(&mut chain, &p);

        let err = decide(&mut chain, &p, Uuid::new_v4(), Decision::Approve, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn test_decided_step_cannot_decide_twice() {
        let (submitter, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(a, false), approver(b, false)],
            false,
            false,
            ApprovalCondition::All,
        );
        let p = policy(r.condition);
        let mut chain = build_chain(Uuid::new_v4(), Some(&r), submitter, None);
        start(&mut chain, &p);

        decide(&mut chain, &p, a, Decision::Approve, None, Utc::now()).unwrap();
        let err = decide(&mut chain, &p, a, Decision::Approve, None, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_policy_falls_back_when_specific_approver_submits() {
        let (cfo, a) = (Uuid::new_v4(), Uuid::new_v4());
        let r = rule(
            None,
            None,
            vec![approver(a, false), approver(cfo, false)],
            false,
            false,
            ApprovalCondition::Hybrid { percentage: 50, approver_id: cfo },
        );
        let chain = build_chain(Uuid::new_v4(), Some(&r), cfo, None);
        let p = ChainPolicy::for_chain(r.condition, &chain);
        assert_eq!(p.condition, ApprovalCondition::Percentage { percentage: 50 });

        let specific = ApprovalCondition::SpecificApprover { approver_id: cfo };
        assert_eq!(ChainPolicy::for_chain(specific, &chain).condition, ApprovalCondition::All);

        let other_chain = build_chain(Uuid::new_v4(), Some(&r), Uuid::new_v4(), None);
        assert_eq!(ChainPolicy::for_chain(specific, &other_chain).condition, specific);
    }

    #[test]
    fn test_override_closes_chain() {
        let (submitter, manager) = (Uuid::new_v4(), Uuid::new_v4());
        let mut chain = build_chain(Uuid::new_v4(), None, submitter, Some(manager));
        start(&mut chain, &ChainPolicy::default());

        assert_eq!(override_chain(&mut chain, Decision::Approve), Outcome::Approved);
        assert_eq!(chain[0].status, StepStatus::Skipped);
    }
}
