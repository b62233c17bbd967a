//! Stock movement endpoints.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::auth::permissions;
use crate::models::movement::{ItemMovement, MovementFilter, RegisterMovementRequest};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::movement_service;

/// Register a stock movement.
///
/// # Endpoint
///
/// `POST /v1/movements`
///
/// # Request Body
///
/// ```json
/// {
///   "movement_type": "INBOUND",
///   "variant_id": "…",
///   "to_bin_id": "…",
///   "quantity": 10,
///   "reference": "PO-771"
/// }
/// ```
///
/// # Movement types
///
/// - `INBOUND`, `ADJUSTMENT_IN`, `RETURN`: add stock to `to_bin_id`
/// - `OUTBOUND`, `ADJUSTMENT_OUT`, `LOSS`: take stock from `item_id`
/// - `TRANSFER`: move stock of `item_id` to `to_bin_id`
///
/// Adjustments and losses need a `reason`.
///
/// # Atomicity
///
/// The item quantities, bin occupancy and the movement row are written in a
/// single database transaction with the involved rows locked (`FOR UPDATE`).
/// Either all of them change or none do.
///
/// # Response
///
/// - **201 Created**: the movement
/// - **400**: not enough stock, bin capacity exceeded, blocked or inactive
///   target bin, or a malformed request
/// - **404**: unknown item, variant or bin
pub async fn register_movement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<RegisterMovementRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::MOVEMENTS_WRITE)?;
    let movement = movement_service::register_movement(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Movement history, newest first. Filters: `item_id`, `variant_id`, `movement_type`.
pub async fn list_movements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<MovementFilter>,
) -> Result<Json<PaginatedResponse<ItemMovement>>, AppError> {
    auth.require(permissions::MOVEMENTS_READ)?;
    let page = PageRequest::from(page);
    let movements = movement_service::list_movements(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(movements, page)))
}
