//! SeaORM entity definitions, kept separate from the domain models.

pub mod approval_rule;
pub mod approval_step;
pub mod company;
pub mod expense;
pub mod otp;
pub mod rule_approver;
pub mod user;
