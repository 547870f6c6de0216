//! HTTP request handlers.

use serde::{Deserialize, Deserializer};

pub mod auth_handler;
pub mod company_handler;
pub mod dashboard_handler;
pub mod expense_handler;
pub mod rule_handler;
pub mod user_handler;

pub use auth_handler::auth_routes;
pub use company_handler::company_routes;
pub use dashboard_handler::dashboard_routes;
pub use expense_handler::{approval_routes, expense_routes};
pub use rule_handler::rule_routes;
pub use user_handler::user_routes;

/// Tells an explicit `null` apart from a missing field.
///
/// Pair with `#[serde(default)]`: absent gives `None`, `null` gives `Some(None)`.
pub(crate) fn nullable<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
