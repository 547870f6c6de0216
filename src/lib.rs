//! Expense Manager - multi-tenant expense reporting with approval workflows.
//!
//! Companies sign up with an admin, add managers and employees, and define
//! approval rules. Employees submit expenses in any supported currency; the
//! approval engine turns the matching rule into a chain of approvers and
//! settles the expense as their decisions come in.
//!
//! # Layers
//!
//! - **domain**: entities, currency conversion and the approval engine
//! - **services**: use cases, one trait per resource
//! - **infra**: database, repositories, unit of work, rate limiting, mail
//! - **api**: axum handlers, middleware and routes
//! - **cli** / **commands**: `serve`, `migrate` and `jobs`
//!
//! ```bash
//! expense-manager migrate up
//! expense-manager serve --port 8080
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

pub use api::AppState;
pub use config::Config;
pub use domain::{Expense, ExpenseStatus, User, UserRole};
pub use errors::{AppError, AppResult};
