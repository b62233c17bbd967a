//! Tenant webhook endpoints and their delivery log.
//!
//! # Webhook Flow
//!
//! 1. A tenant registers an endpoint via `POST /v1/webhooks`
//! 2. The server generates a secret for HMAC signature verification
//! 3. Domain events (`payroll.approved`, `volume.delivered`, ...) are POSTed
//!    to every active endpoint subscribed to them, with a signed payload
//! 4. The receiver verifies the signature using the secret
//!
//! # Security
//!
//! - Secrets are only shown once during registration
//! - Payloads are signed using HMAC-SHA256
//! - HTTPS is required outside localhost

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Webhook endpoint registered by a tenant.
///
/// The `secret` is stored in plaintext (required for HMAC generation)
/// but never returned after registration.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    pub secret: String,
    /// Subscribed event types; empty means every event.
    pub events: Vec<String>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

tenant_record!(WebhookEndpoint);

impl WebhookEndpoint {
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.is_active && (self.events.is_empty() || self.events.iter().any(|e| e == event_type))
    }
}

/// Request to register a new webhook endpoint.
///
/// # Example
///
/// ```json
/// {
///   "url": "https://example.com/webhook",
///   "events": ["payroll.paid", "volume.delivered"]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct WebhookEndpointRequest {
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
}

/// The `secret` field is only included when the endpoint is created.
#[derive(Debug, Serialize)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub url: String,
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for WebhookEndpointResponse {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            events: endpoint.events,
            secret: None,
            is_active: endpoint.is_active,
            created_at: endpoint.created_at,
        }
    }
}

impl WebhookEndpointResponse {
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// One delivery attempt, successful or not.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

tenant_record!(WebhookDelivery);

/// JSON body POSTed to an endpoint.
///
/// ```json
/// {
///   "event_type": "payroll.paid",
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "created_at": "2025-01-15T10:30:00Z",
///   "data": { "id": "...", "status": "PAID" }
/// }
/// ```
///
/// The `X-Webhook-Signature` header carries `sha256=<hex hmac of the body>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event_type: String,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl WebhookPayload {
    pub fn new(event_type: &str, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            event_id: Uuid::new_v4(),
            created_at: Utc::now(),
            data,
        }
    }
}

/// Event type names emitted by the services.
pub mod events {
    pub const ABSENCE_APPROVED: &str = "absence.approved";
    pub const ABSENCE_REJECTED: &str = "absence.rejected";
    pub const PAYROLL_APPROVED: &str = "payroll.approved";
    pub const PAYROLL_PAID: &str = "payroll.paid";
    pub const FINANCE_ENTRY_PAID: &str = "finance.entry.paid";
    pub const STOCK_MOVEMENT_REGISTERED: &str = "stock.movement.registered";
    pub const VOLUME_DELIVERED: &str = "volume.delivered";
    pub const VOLUME_RETURNED: &str = "volume.returned";

    pub const ALL: &[&str] = &[
        ABSENCE_APPROVED,
        ABSENCE_REJECTED,
        PAYROLL_APPROVED,
        PAYROLL_PAID,
        FINANCE_ENTRY_PAID,
        STOCK_MOVEMENT_REGISTERED,
        VOLUME_DELIVERED,
        VOLUME_RETURNED,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(events: Vec<String>) -> WebhookEndpoint {
        WebhookEndpoint {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            url: "https://example.com/hook".into(),
            secret: "s".into(),
            events,
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_subscription_means_everything() {
        assert!(endpoint(vec![]).subscribes_to(events::PAYROLL_PAID));
    }

    #[test]
    fn explicit_subscription_filters() {
        let e = endpoint(vec![events::VOLUME_DELIVERED.into()]);
        assert!(e.subscribes_to(events::VOLUME_DELIVERED));
        assert!(!e.subscribes_to(events::PAYROLL_PAID));
    }

    #[test]
    fn inactive_endpoints_receive_nothing() {
        let mut e = endpoint(vec![]);
        e.is_active = false;
        assert!(!e.subscribes_to(events::PAYROLL_PAID));
    }

    #[test]
    fn response_hides_secret() {
        let json = serde_json::to_value(WebhookEndpointResponse::from(endpoint(vec![]))).unwrap();
        assert!(json.get("secret").is_none());
    }
}
