//! Company (tenant) domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A tenant. Every other record belongs to exactly one company.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Company {
    pub id: Uuid,
    #[schema(example = "Acme Corp")]
    pub name: String,
    #[schema(example = "India")]
    pub country: String,
    /// ISO-4217 code all approvals and dashboards are reported in
    #[schema(example = "INR")]
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to insert a company
#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub country: String,
    pub currency: String,
}
