//! Shipping volumes.
//!
//! A volume collects stock items for one shipment:
//! `OPEN <-> CLOSED -> DELIVERED -> RETURNED`. Items can only be added or
//! removed while the volume is open, and an empty volume cannot be closed.

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
use crate::models::volume::{
    AddVolumeItemRequest, CreateVolumeRequest, PackingList, Volume, VolumeDetail, VolumeFilter,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::volume_service;

/// Open a new volume. Its code (`VOL-` plus eight hex digits) is generated.
pub async fn create_volume(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateVolumeRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::VOLUMES_WRITE)?;
    let volume = volume_service::create_volume(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(volume)))
}

pub async fn list_volumes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<VolumeFilter>,
) -> Result<Json<PaginatedResponse<Volume>>, AppError> {
    auth.require(permissions::VOLUMES_READ)?;
    let page = PageRequest::from(page);
    let volumes = volume_service::list_volumes(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(volumes, page)))
}

/// Volume with its items.
pub async fn get_volume(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VolumeDetail>, AppError> {
    auth.require(permissions::VOLUMES_READ)?;
    Ok(Json(volume_service::get_volume(&state.ctx, &auth, id).await?))
}

/// Put stock into an open volume.
///
/// # Request Body
///
/// ```json
/// { "item_id": "…", "quantity": 2 }
/// ```
///
/// The quantity must be at least 1 and at most what the item holds.
pub async fn add_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddVolumeItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::VOLUMES_WRITE)?;
    let item = volume_service::add_item(&state.ctx, &auth, id, request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, volume_item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::VOLUMES_WRITE)?;
    volume_service::remove_item(&state.ctx, &auth, id, volume_item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn close_volume(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Volume>, AppError> {
    auth.require(permissions::VOLUMES_WRITE)?;
    Ok(Json(
        volume_service::close_volume(&state.ctx, &auth, id).await?,
    ))
}

pub async fn reopen_volume(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Volume>, AppError> {
    auth.require(permissions::VOLUMES_WRITE)?;
    Ok(Json(
        volume_service::reopen_volume(&state.ctx, &auth, id).await?,
    ))
}

pub async fn deliver_volume(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Volume>, AppError> {
    auth.require(permissions::VOLUMES_WRITE)?;
    Ok(Json(
        volume_service::deliver_volume(&state.ctx, &auth, id).await?,
    ))
}

pub async fn return_volume(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Volume>, AppError> {
    auth.require(permissions::VOLUMES_WRITE)?;
    Ok(Json(
        volume_service::return_volume(&state.ctx, &auth, id).await?,
    ))
}

/// Printable packing list.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "volume_id": "…",
///   "code": "VOL-1A2B3C4D",
///   "status": "CLOSED",
///   "destination": "Store 12",
///   "lines": [
///     { "sku": "TEE-BLUE-M", "variant_name": "Blue / M", "bin_address": "A-01", "quantity": 2, "…": "…" }
///   ],
///   "total_lines": 1,
///   "total_quantity": 2
/// }
/// ```
pub async fn packing_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PackingList>, AppError> {
    auth.require(permissions::VOLUMES_READ)?;
    Ok(Json(
        volume_service::packing_list(&state.ctx, &auth, id).await?,
    ))
}
