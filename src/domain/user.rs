//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{ROLE_ADMIN, ROLE_EMPLOYEE, ROLE_MANAGER};

/// User roles enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    Employee,
}

impl UserRole {
    /// Check if this role has admin privileges
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Roles that may sit on an approval chain or manage other users
    pub fn can_approve(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => ROLE_ADMIN,
            UserRole::Manager => ROLE_MANAGER,
            UserRole::Employee => ROLE_EMPLOYEE,
        }
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s {
            ROLE_ADMIN => UserRole::Admin,
            ROLE_MANAGER => UserRole::Manager,
            _ => UserRole::Employee,
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    /// Direct manager within the same company
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete timestamp (None = active, Some = deleted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Check if user has admin role
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Check if user is soft deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Check if user is active (not deleted)
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Whether `other` reports directly to this user
    pub fn manages(&self, other: &User) -> bool {
        other.manager_id == Some(self.id) && other.company_id == self.company_id
    }
}

/// Data required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub company_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub manager_id: Option<Uuid>,
}

/// Partial user update. `manager_id: Some(None)` clears the manager.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub manager_id: Option<Option<Uuid>>,
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    /// Unique user identifier
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// Company the user belongs to
    pub company_id: Uuid,
    /// User email address
    #[schema(example = "user@example.com")]
    pub email: String,
    /// User display name
    #[schema(example = "John Doe")]
    pub name: String,
    /// User role
    #[schema(example = "employee")]
    pub role: UserRole,
    /// Direct manager, if any
    pub manager_id: Option<Uuid>,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    /// Set when the account has been deactivated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            company_id: user.company_id,
            email: user.email,
            name: user.name,
            role: user.role,
            manager_id: user.manager_id,
            created_at: user.created_at,
            deleted_at: user.deleted_at,
        }
    }
}

/// Ensure assigning `manager` to `user` keeps the reporting line acyclic.
///
/// `chain_of` yields the manager id of a given user id; it is walked from the
/// proposed manager upwards and must never reach `user_id`.
pub fn creates_reporting_cycle<F>(user_id: Uuid, manager_id: Uuid, mut chain_of: F) -> bool
where
    F: FnMut(Uuid) -> Option<Uuid>,
{
    let mut current = Some(manager_id);
    let mut hops = 0usize;

    while let Some(id) = current {
        if id == user_id {
            return true;
        }
        hops += 1;
        // A pre-existing loop that does not include user_id
        if hops > 10_000 {
            return true;
        }
        current = chain_of(id);
    }

    false
}
