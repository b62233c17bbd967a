//! Tenancy and access-control models.
//!
//! This module defines:
//! - `Tenant`: a customer organisation; every other row carries its id
//! - `Role`: a named set of permission codes
//! - `User`: a person acting inside one tenant, holding one role
//! - `ApiKey`: a bearer credential for a user, stored as a SHA-256 hash
//! - Permission code parsing and wildcard matching

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// A customer organisation whose data is isolated by `tenant_id`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl crate::repositories::memory::Record for Tenant {
    fn id(&self) -> Uuid {
        self.id
    }

    /// Tenants are their own scope.
    fn tenant_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Permission codes such as `hr.payroll.approve`, `stock.*` or `*`.
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub role_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Represents an API key record from the database.
///
/// # Key Storage
///
/// Only the SHA-256 hash of the key is stored. When a request comes in with
/// `Bearer abc123`, the middleware hashes `abc123` and looks the hash up.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub label: String,
    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,
    /// Inactive keys are rejected during authentication.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

tenant_record!(Role, User, ApiKey);

/// API key as shown to clients; the hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub label: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Plaintext key, only present in the response that issued it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            user_id: key.user_id,
            label: key.label,
            is_active: key.is_active,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            key: None,
        }
    }
}

impl ApiKeyResponse {
    /// Create response with the plaintext key included (only when issuing).
    pub fn with_key(mut self, key: String) -> Self {
        self.key = Some(key);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct IssueApiKeyRequest {
    pub label: String,
}

/// The authenticated caller, as seen by `GET /v1/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub role: Role,
    pub tenant: Tenant,
}

/// Build a URL-friendly slug: lower-case alphanumerics, other runs collapsed to `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Check that a permission code is well formed.
///
/// Codes are dot-separated lower-case segments (`hr.payroll.approve`). A lone
/// `*` or a trailing `*` segment (`hr.*`) is a wildcard.
pub fn validate_permission(code: &str) -> Result<(), AppError> {
    if code == "*" {
        return Ok(());
    }

    let segments: Vec<&str> = code.split('.').collect();
    let last = segments.len() - 1;

    for (index, segment) in segments.iter().enumerate() {
        let valid = if *segment == "*" {
            index == last && index > 0
        } else {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '_')
        };

        if !valid {
            return Err(AppError::BadRequest(format!(
                "Invalid permission code: {code}"
            )));
        }
    }

    Ok(())
}

/// Does a held permission grant the required one?
pub fn permission_grants(held: &str, required: &str) -> bool {
    if held == "*" || held == required {
        return true;
    }

    match held.strip_suffix(".*") {
        Some(prefix) => required
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => false,
    }
}

/// Permission codes checked by the handlers.
pub mod permissions {
    pub const ROLES_READ: &str = "rbac.roles.read";
    pub const ROLES_WRITE: &str = "rbac.roles.write";
    pub const USERS_READ: &str = "rbac.users.read";
    pub const USERS_WRITE: &str = "rbac.users.write";

    pub const EMPLOYEES_READ: &str = "hr.employees.read";
    pub const EMPLOYEES_WRITE: &str = "hr.employees.write";
    pub const ABSENCES_READ: &str = "hr.absences.read";
    pub const ABSENCES_WRITE: &str = "hr.absences.write";
    pub const ABSENCES_APPROVE: &str = "hr.absences.approve";
    pub const VACATIONS_READ: &str = "hr.vacations.read";
    pub const VACATIONS_WRITE: &str = "hr.vacations.write";
    pub const PAYROLL_READ: &str = "hr.payroll.read";
    pub const PAYROLL_WRITE: &str = "hr.payroll.write";
    pub const PAYROLL_APPROVE: &str = "hr.payroll.approve";
    pub const PAYROLL_PAY: &str = "hr.payroll.pay";
    pub const LOANS_READ: &str = "hr.loans.read";
    pub const LOANS_WRITE: &str = "hr.loans.write";
    pub const DEDUCTIONS_READ: &str = "hr.deductions.read";
    pub const DEDUCTIONS_WRITE: &str = "hr.deductions.write";

    pub const FINANCE_READ: &str = "finance.entries.read";
    pub const FINANCE_WRITE: &str = "finance.entries.write";
    pub const FINANCE_PAY: &str = "finance.entries.pay";

    pub const LOCATIONS_READ: &str = "stock.locations.read";
    pub const LOCATIONS_WRITE: &str = "stock.locations.write";
    pub const CATALOG_READ: &str = "stock.catalog.read";
    pub const CATALOG_WRITE: &str = "stock.catalog.write";
    pub const MOVEMENTS_READ: &str = "stock.movements.read";
    pub const MOVEMENTS_WRITE: &str = "stock.movements.write";
    pub const VOLUMES_READ: &str = "stock.volumes.read";
    pub const VOLUMES_WRITE: &str = "stock.volumes.write";

    pub const CUSTOMERS_READ: &str = "sales.customers.read";
    pub const CUSTOMERS_WRITE: &str = "sales.customers.write";
    pub const PROMOTIONS_READ: &str = "sales.promotions.read";
    pub const PROMOTIONS_WRITE: &str = "sales.promotions.write";

    pub const AUDIT_READ: &str = "audit.logs.read";
    pub const AUDIT_VERIFY: &str = "audit.logs.verify";

    pub const NOTIFICATIONS_SEND: &str = "notifications.messages.send";
    pub const WEBHOOKS_READ: &str = "settings.webhooks.read";
    pub const WEBHOOKS_WRITE: &str = "settings.webhooks.write";
    pub const FILES_WRITE: &str = "storage.files.write";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Acme Industries, Ltd."), "acme-industries-ltd");
        assert_eq!(slugify("  Garden & Tools  "), "garden-tools");
        assert_eq!(slugify("Électrique 220V"), "lectrique-220v");
    }

    #[test]
    fn validates_permission_codes() {
        assert!(validate_permission("*").is_ok());
        assert!(validate_permission("hr.payroll.approve").is_ok());
        assert!(validate_permission("stock.*").is_ok());
        assert!(validate_permission("hr.*.read").is_err());
        assert!(validate_permission("*.read").is_err());
        assert!(validate_permission("HR.payroll").is_err());
        assert!(validate_permission("hr..read").is_err());
        assert!(validate_permission("").is_err());
    }

    #[test]
    fn wildcard_grants() {
        assert!(permission_grants("*", "hr.payroll.approve"));
        assert!(permission_grants("hr.*", "hr.payroll.approve"));
        assert!(permission_grants("hr.payroll.*", "hr.payroll.approve"));
        assert!(permission_grants("hr.payroll.read", "hr.payroll.read"));
        assert!(!permission_grants("hr.payroll.read", "hr.payroll.approve"));
        assert!(!permission_grants("hr.*", "hrx.payroll.read"));
        assert!(!permission_grants("stock.*", "hr.payroll.read"));
    }
}
