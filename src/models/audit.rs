//! Tamper-evident audit trail.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::FromRow;
use uuid::Uuid;

string_enum! {
    pub enum AuditAction {
        Create => "CREATE",
        Update => "UPDATE",
        Delete => "DELETE",
        Approve => "APPROVE",
        Reject => "REJECT",
        Cancel => "CANCEL",
        Pay => "PAY",
        Login => "LOGIN",
        Other => "OTHER",
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    /// Functional area, e.g. `hr.payroll`.
    pub module: String,
    /// Entity kind, e.g. `payroll`.
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    /// Hex HMAC-SHA256 of [`AuditLog::canonical_payload`].
    pub signature: String,
}

tenant_record!(AuditLog);

/// What a service reports after a mutation.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub module: &'static str,
    pub entity: &'static str,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        module: &'static str,
        entity: &'static str,
        entity_id: Uuid,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            module,
            entity,
            entity_id: Some(entity_id),
            description: description.into(),
            old_data: None,
            new_data: None,
        }
    }

    pub fn with_old<T: Serialize>(mut self, data: &T) -> Self {
        self.old_data = serde_json::to_value(data).ok();
        self
    }

    pub fn with_new<T: Serialize>(mut self, data: &T) -> Self {
        self.new_data = serde_json::to_value(data).ok();
        self
    }
}

impl AuditLog {
    /// Unsigned log row. Timestamps are truncated to microseconds so they
    /// survive a round trip through Postgres unchanged.
    pub fn from_entry(tenant_id: Uuid, user_id: Option<Uuid>, entry: AuditEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            action: entry.action,
            module: entry.module.to_string(),
            entity: entry.entity.to_string(),
            entity_id: entry.entity_id,
            description: entry.description,
            old_data: entry.old_data,
            new_data: entry.new_data,
            created_at: Utc::now().trunc_subsecs(6),
            signature: String::new(),
        }
    }

    /// Bytes covered by the signature: every field but the signature itself.
    ///
    /// `serde_json::Value` objects keep keys sorted, so nested data serialises
    /// identically after being read back.
    pub fn canonical_payload(&self) -> Vec<u8> {
        let payload = json!({
            "id": self.id,
            "tenant_id": self.tenant_id,
            "user_id": self.user_id,
            "action": self.action.as_str(),
            "module": self.module,
            "entity": self.entity,
            "entity_id": self.entity_id,
            "description": self.description,
            "old_data": self.old_data,
            "new_data": self.new_data,
            "created_at": self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        payload.to_string().into_bytes()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditFilter {
    pub module: Option<String>,
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.module.as_deref().is_none_or(|m| log.module == m)
            && self.entity.as_deref().is_none_or(|e| log.entity == e)
            && self.entity_id.is_none_or(|id| log.entity_id == Some(id))
            && self.user_id.is_none_or(|id| log.user_id == Some(id))
            && self.action.is_none_or(|a| log.action == a)
            && self.from.is_none_or(|from| log.created_at >= from)
            && self.to.is_none_or(|to| log.created_at <= to)
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub id: Uuid,
    pub valid: bool,
}
