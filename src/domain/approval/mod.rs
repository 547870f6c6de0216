//! Approval rules and the engine that runs expenses through them.

pub mod engine;
pub mod rule;

pub use engine::{
    activate, build_chain, decide, evaluate, override_chain, select_rule, start, ApprovalStep,
    ChainPolicy, Decision, Outcome, Resolution, StepStatus,
};
pub use rule::{ApprovalCondition, ApprovalRule, RuleApprover, RuleDefinition};
