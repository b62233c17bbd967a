//! HTTP handlers for webhook endpoint management.
//!
//! Tenants register, list and delete the endpoints that receive domain
//! events, and can inspect the delivery log of each one.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::auth::permissions;
use crate::models::webhook::{WebhookDelivery, WebhookEndpointRequest, WebhookEndpointResponse};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::webhook_service;

/// Register a new webhook endpoint.
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/webhook",
///   "events": ["payroll.paid", "volume.delivered"]
/// }
/// ```
///
/// An empty or missing `events` list subscribes to every event.
///
/// # Response
///
/// Returns 201 Created with the webhook endpoint details.
/// The `secret` is only returned once during creation.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "url": "https://example.com/webhook",
///   "events": ["payroll.paid", "volume.delivered"],
///   "secret": "a1b2c3d4e5f6...",
///   "is_active": true,
///   "created_at": "2025-01-15T10:30:00Z"
/// }
/// ```
///
/// # Security
///
/// - Requires `settings.webhooks.write`
/// - HTTPS URLs required (HTTP localhost allowed for development)
/// - Unknown event names are rejected with 400
/// - Secret is 64-character hex string for HMAC-SHA256
pub async fn create_webhook(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WebhookEndpointRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::WEBHOOKS_WRITE)?;
    let endpoint = webhook_service::create_endpoint(&state.ctx, &auth, request).await?;

    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// List all active webhook endpoints of the tenant.
///
/// # Response
///
/// Returns array of webhook endpoints (secrets NOT included).
///
/// ```json
/// [
///   {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "url": "https://example.com/webhook",
///     "events": [],
///     "is_active": true,
///     "created_at": "2025-01-15T10:30:00Z"
///   }
/// ]
/// ```
pub async fn list_webhooks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<WebhookEndpointResponse>>, AppError> {
    auth.require(permissions::WEBHOOKS_READ)?;
    let webhooks = webhook_service::list_endpoints(&state.ctx, &auth).await?;

    Ok(Json(webhooks))
}

/// Delete a webhook endpoint (soft delete).
///
/// # Response
///
/// Returns 204 No Content on success.
///
/// # Process
///
/// Sets `is_active = false` to preserve the delivery log.
/// The endpoint will no longer receive events.
///
/// Returns 404 if the webhook is not found or belongs to another tenant.
pub async fn delete_webhook(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::WEBHOOKS_WRITE)?;
    webhook_service::delete_endpoint(&state.ctx, &auth, webhook_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delivery attempts for one endpoint, newest first.
pub async fn list_deliveries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<WebhookDelivery>>, AppError> {
    auth.require(permissions::WEBHOOKS_READ)?;
    let page = PageRequest::from(page);
    let deliveries = webhook_service::list_deliveries(&state.ctx, &auth, webhook_id, page).await?;

    Ok(Json(PaginatedResponse::new(deliveries, page)))
}
