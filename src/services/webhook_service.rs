//! Webhook service for managing endpoints and sending events.
//!
//! This module handles webhook endpoint registration, background event
//! delivery, and HMAC signature generation for secure webhook verification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use failsafe::Error as BreakerError;
use failsafe::futures::CircuitBreaker;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::webhook::{
    WebhookDelivery, WebhookEndpoint, WebhookEndpointRequest, WebhookEndpointResponse,
    WebhookPayload, events,
};
use crate::pagination::{Page, PageRequest};
use crate::repositories::WebhookRepository;
use crate::resilience::{self, Breaker};

type HmacSha256 = Hmac<Sha256>;

const MAX_URL_LEN: usize = 2048;
const MAX_STORED_BODY: usize = 1024;

/// Sends domain events to tenant endpoints in the background.
///
/// Each endpoint gets its own circuit breaker, so one dead receiver does not
/// hold back deliveries to the others.
#[derive(Clone)]
pub struct WebhookDispatcher {
    repo: Arc<dyn WebhookRepository>,
    client: reqwest::Client,
    breakers: Arc<Mutex<HashMap<Uuid, Arc<Breaker>>>>,
}

/// Why a delivery attempt failed.
#[derive(Debug)]
struct DeliveryFailure {
    status: Option<i32>,
    body: Option<String>,
    error: String,
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error)
    }
}

impl WebhookDispatcher {
    pub fn new(repo: Arc<dyn WebhookRepository>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default webhook HTTP client");
                reqwest::Client::new()
            });
        Self {
            repo,
            client,
            breakers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Deliver an event on a background task.
    pub fn dispatch(&self, tenant_id: Uuid, event_type: &'static str, data: Value) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.deliver_event(tenant_id, event_type, data).await {
                tracing::error!(%tenant_id, event_type, error = %e, "Webhook dispatch failed");
            }
        });
    }

    /// Send an event to every subscribed endpoint of the tenant.
    ///
    /// Individual endpoint failures are recorded as deliveries and don't fail
    /// the overall operation. Returns the number of endpoints attempted.
    pub async fn deliver_event(
        &self,
        tenant_id: Uuid,
        event_type: &str,
        data: Value,
    ) -> Result<usize, AppError> {
        let endpoints: Vec<WebhookEndpoint> = self
            .repo
            .list_active_endpoints(tenant_id)
            .await?
            .into_iter()
            .filter(|e| e.subscribes_to(event_type))
            .collect();
        if endpoints.is_empty() {
            return Ok(0);
        }

        let payload = WebhookPayload::new(event_type, data);
        for endpoint in &endpoints {
            let delivery = self.send(endpoint, &payload).await?;
            if let Some(error) = &delivery.error {
                tracing::warn!(
                    %tenant_id,
                    endpoint_id = %endpoint.id,
                    event_type,
                    error = %error,
                    "Webhook delivery failed"
                );
            }
            if let Err(e) = self.repo.record_delivery(&delivery).await {
                tracing::error!(endpoint_id = %endpoint.id, error = %e, "Failed to record webhook delivery");
            }
        }

        Ok(endpoints.len())
    }

    async fn breaker_for(&self, endpoint_id: Uuid) -> Arc<Breaker> {
        self.breakers
            .lock()
            .await
            .entry(endpoint_id)
            .or_insert_with(|| Arc::new(resilience::breaker()))
            .clone()
    }

    /// POST one signed payload.
    ///
    /// # Headers Sent
    ///
    /// - `Content-Type: application/json`
    /// - `X-Webhook-Signature: sha256=<hex>`
    /// - `X-Webhook-Event-Id: <uuid>`
    /// - `X-Webhook-Event: <event type>`
    ///
    /// Server errors and transport failures count against the endpoint's breaker.
    async fn send(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &WebhookPayload,
    ) -> Result<WebhookDelivery, AppError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {e}")))?;
        let signature = generate_signature(&endpoint.secret, &body)?;

        let request = self
            .client
            .post(&endpoint.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Webhook-Signature", signature)
            .header("X-Webhook-Event-Id", payload.event_id.to_string())
            .header("X-Webhook-Event", payload.event_type.as_str())
            .body(body.clone());

        let attempt = async move {
            let response = request.send().await.map_err(|e| DeliveryFailure {
                status: None,
                body: None,
                error: format!("Request failed: {e}"),
            })?;
            let status = response.status();
            let text = response.text().await.ok().map(truncate_body);
            if status.is_server_error() {
                Err(DeliveryFailure {
                    status: Some(i32::from(status.as_u16())),
                    body: text,
                    error: format!("Endpoint answered {status}"),
                })
            } else {
                Ok((i32::from(status.as_u16()), text))
            }
        };

        let breaker = self.breaker_for(endpoint.id).await;
        let (response_status, response_body, error) = match breaker.call(attempt).await {
            Ok((status, text)) => (Some(status), text, None),
            Err(BreakerError::Inner(failure)) => (failure.status, failure.body, Some(failure.error)),
            Err(BreakerError::Rejected) => (None, None, Some("Circuit open, delivery skipped".to_string())),
        };

        Ok(WebhookDelivery {
            id: Uuid::new_v4(),
            tenant_id: endpoint.tenant_id,
            endpoint_id: endpoint.id,
            event_id: payload.event_id,
            event_type: payload.event_type.clone(),
            payload: serde_json::from_str(&body).unwrap_or(Value::Null),
            sent_at: Utc::now(),
            response_status,
            response_body,
            error,
        })
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_STORED_BODY {
        let mut end = MAX_STORED_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

/// Register a new webhook endpoint.
///
/// # Process
///
/// 1. Validate URL format and event names
/// 2. Generate cryptographically secure secret (32 bytes)
/// 3. Store endpoint
/// 4. Return endpoint with secret (only shown once)
///
/// # Security
///
/// - HTTPS is required for production endpoints
/// - HTTP localhost is allowed for testing
pub async fn create_endpoint(
    ctx: &Context,
    auth: &AuthContext,
    request: WebhookEndpointRequest,
) -> Result<WebhookEndpointResponse, AppError> {
    validate_webhook_url(&request.url)?;
    validate_events(&request.events)?;

    let secret = generate_secret();
    let endpoint = WebhookEndpoint {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        url: request.url,
        secret: secret.clone(),
        events: request.events,
        is_active: true,
        created_by: auth.user_id,
        created_at: Utc::now(),
    };
    ctx.repos.webhooks.create_endpoint(&endpoint).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            "settings.webhooks",
            "webhook_endpoint",
            endpoint.id,
            format!("Webhook endpoint registered for {}", endpoint.url),
        ),
    )
    .await;

    Ok(WebhookEndpointResponse::from(endpoint).with_secret(secret))
}

/// Active endpoints of the tenant, secrets excluded.
pub async fn list_endpoints(
    ctx: &Context,
    auth: &AuthContext,
) -> Result<Vec<WebhookEndpointResponse>, AppError> {
    let endpoints = ctx.repos.webhooks.list_active_endpoints(auth.tenant_id).await?;
    Ok(endpoints.into_iter().map(Into::into).collect())
}

/// Soft delete: the endpoint stops receiving events, its deliveries are kept.
pub async fn delete_endpoint(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    if !ctx.repos.webhooks.deactivate_endpoint(auth.tenant_id, id).await? {
        return Err(AppError::NotFound("Webhook endpoint"));
    }

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Delete,
            "settings.webhooks",
            "webhook_endpoint",
            id,
            "Webhook endpoint removed",
        ),
    )
    .await;
    Ok(())
}

pub async fn list_deliveries(
    ctx: &Context,
    auth: &AuthContext,
    endpoint_id: Uuid,
    page: PageRequest,
) -> Result<Page<WebhookDelivery>, AppError> {
    ctx.repos
        .webhooks
        .list_deliveries(auth.tenant_id, endpoint_id, page)
        .await
}

/// Generate HMAC-SHA256 signature for webhook payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
///
/// # Verification
///
/// Clients should:
/// 1. Extract signature from `X-Webhook-Signature` header
/// 2. Compute HMAC-SHA256(secret, request_body)
/// 3. Compare using constant-time comparison
pub fn generate_signature(secret: &str, payload: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// 64 hex characters (32 random bytes).
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
pub fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > MAX_URL_LEN {
        return Err(AppError::bad_request("URL exceeds 2048 characters"));
    }

    let parsed = url::Url::parse(url).map_err(|_| AppError::bad_request("Invalid URL format"))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => match parsed.host_str() {
            Some("localhost" | "127.0.0.1" | "0.0.0.0") => Ok(()),
            _ => Err(AppError::bad_request(
                "HTTP is only allowed for localhost. Use HTTPS for production.",
            )),
        },
        _ => Err(AppError::bad_request("URL must use HTTP or HTTPS")),
    }
}

fn validate_events(requested: &[String]) -> Result<(), AppError> {
    match requested.iter().find(|e| !events::ALL.contains(&e.as_str())) {
        Some(unknown) => Err(AppError::BadRequest(format!("Unknown event type: {unknown}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::testing;

    #[test]
    fn stored_body_is_capped_in_bytes() {
        let short = "ok".to_string();
        assert_eq!(truncate_body(short.clone()), short);

        // three bytes per char, so the cap falls inside a char
        let wide = "€".repeat(MAX_STORED_BODY);
        let cut = truncate_body(wide);
        assert!(cut.len() <= MAX_STORED_BODY);
        assert_eq!(cut.len(), MAX_STORED_BODY - MAX_STORED_BODY % 3);
        assert!(cut.chars().all(|c| c == '€'));
    }

    #[test]
    fn signature_is_deterministic() {
        let a = generate_signature("secret", r#"{"a":1}"#).unwrap();
        let b = generate_signature("secret", r#"{"a":1}"#).unwrap();
        let c = generate_signature("other", r#"{"a":1}"#).unwrap();
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn url_rules() {
        assert!(validate_webhook_url("https://example.com/hook").is_ok());
        assert!(validate_webhook_url("http://localhost:8080/hook").is_ok());
        assert!(validate_webhook_url("http://127.0.0.1/hook").is_ok());
        assert!(validate_webhook_url("http://example.com/hook").is_err());
        assert!(validate_webhook_url("ftp://example.com/hook").is_err());
        assert!(validate_webhook_url("not a url").is_err());

        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert!(validate_webhook_url(&long).is_err());
    }

    #[test]
    fn secrets_are_random_hex() {
        let a = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, generate_secret());
    }

    #[tokio::test]
    async fn register_shows_secret_once() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;

        let created = create_endpoint(
            &ctx,
            &auth,
            WebhookEndpointRequest {
                url: "https://example.com/hook".into(),
                events: vec![events::PAYROLL_PAID.into()],
            },
        )
        .await
        .unwrap();
        assert!(created.secret.is_some());

        let listed = list_endpoints(&ctx, &auth).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].secret.is_none());
    }

    #[tokio::test]
    async fn unknown_events_are_rejected() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;

        let result = create_endpoint(
            &ctx,
            &auth,
            WebhookEndpointRequest {
                url: "https://example.com/hook".into(),
                events: vec!["payroll.exploded".into()],
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn deleted_endpoints_stop_listing() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let created = create_endpoint(
            &ctx,
            &auth,
            WebhookEndpointRequest {
                url: "https://example.com/hook".into(),
                events: vec![],
            },
        )
        .await
        .unwrap();

        delete_endpoint(&ctx, &auth, created.id).await.unwrap();
        assert!(list_endpoints(&ctx, &auth).await.unwrap().is_empty());
        assert!(matches!(
            delete_endpoint(&ctx, &auth, created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unsubscribed_events_are_not_sent() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        create_endpoint(
            &ctx,
            &auth,
            WebhookEndpointRequest {
                url: "http://127.0.0.1:9/hook".into(),
                events: vec![events::VOLUME_DELIVERED.into()],
            },
        )
        .await
        .unwrap();

        let sent = ctx
            .webhooks
            .deliver_event(auth.tenant_id, events::PAYROLL_PAID, json!({}))
            .await
            .unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn failed_deliveries_are_recorded() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let endpoint = create_endpoint(
            &ctx,
            &auth,
            WebhookEndpointRequest {
                url: "http://127.0.0.1:9/hook".into(),
                events: vec![],
            },
        )
        .await
        .unwrap();

        let sent = ctx
            .webhooks
            .deliver_event(auth.tenant_id, events::PAYROLL_PAID, json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let deliveries = list_deliveries(&ctx, &auth, endpoint.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(deliveries.total, 1);
        let delivery = &deliveries.items[0];
        assert_eq!(delivery.event_type, events::PAYROLL_PAID);
        assert!(delivery.response_status.is_none());
        assert!(delivery.error.is_some());
        assert_eq!(delivery.payload["data"]["id"], 1);
    }
}
