//! Warehouses, zones and bins.

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
use crate::models::location::{
    BinResponse, BlockBinRequest, CreateBinRequest, CreateWarehouseRequest, CreateZoneRequest,
    GenerateBinsRequest, GenerateBinsResponse, UpdateWarehouseRequest, Warehouse, Zone,
    ZoneOccupancy,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::location_service;

/// Create a warehouse.
///
/// # Request Body
///
/// ```json
/// { "code": "main", "name": "Main warehouse", "address": "Dock street 1" }
/// ```
///
/// Codes are stored upper-case and must be unique per tenant (409).
pub async fn create_warehouse(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateWarehouseRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    let warehouse = location_service::create_warehouse(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<Warehouse>>, AppError> {
    auth.require(permissions::LOCATIONS_READ)?;
    let page = PageRequest::from(page);
    let warehouses = location_service::list_warehouses(&state.ctx, &auth, page).await?;
    Ok(Json(PaginatedResponse::new(warehouses, page)))
}

pub async fn get_warehouse(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Warehouse>, AppError> {
    auth.require(permissions::LOCATIONS_READ)?;
    Ok(Json(
        location_service::get_warehouse(&state.ctx, &auth, id).await?,
    ))
}

pub async fn update_warehouse(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateWarehouseRequest>,
) -> Result<Json<Warehouse>, AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    Ok(Json(
        location_service::update_warehouse(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn delete_warehouse(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    location_service::delete_warehouse(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_zone(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(warehouse_id): Path<Uuid>,
    Json(request): Json<CreateZoneRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    let zone = location_service::create_zone(&state.ctx, &auth, warehouse_id, request).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

pub async fn list_zones(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(warehouse_id): Path<Uuid>,
) -> Result<Json<Vec<Zone>>, AppError> {
    auth.require(permissions::LOCATIONS_READ)?;
    Ok(Json(
        location_service::list_zones(&state.ctx, &auth, warehouse_id).await?,
    ))
}

/// Create a single bin in a zone: `{ "address": "A-01", "capacity": 50 }`.
pub async fn create_bin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(zone_id): Path<Uuid>,
    Json(request): Json<CreateBinRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    let bin = location_service::create_bin(&state.ctx, &auth, zone_id, request).await?;
    Ok((StatusCode::CREATED, Json(bin)))
}

/// Create a grid of bins.
///
/// # Endpoint
///
/// `POST /v1/zones/{id}/bins/generate`
///
/// # Request Body
///
/// ```json
/// { "aisles": 2, "shelves_per_aisle": 3, "levels_per_shelf": 2, "capacity": 40 }
/// ```
///
/// # Response (201 Created)
///
/// Addresses follow `ZONE-AA-SS-LL`. Addresses that already exist are
/// skipped and counted, not overwritten.
///
/// ```json
/// { "created": 10, "skipped": 2, "bins": [ { "address": "A-01-01-01", "…": "…" } ] }
/// ```
pub async fn generate_bins(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(zone_id): Path<Uuid>,
    Json(request): Json<GenerateBinsRequest>,
) -> Result<(StatusCode, Json<GenerateBinsResponse>), AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    let generated = location_service::generate_bins(&state.ctx, &auth, zone_id, request).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

pub async fn list_bins(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<Vec<BinResponse>>, AppError> {
    auth.require(permissions::LOCATIONS_READ)?;
    Ok(Json(
        location_service::list_bins(&state.ctx, &auth, zone_id).await?,
    ))
}

/// Capacity, usage and bin counts for a zone.
pub async fn zone_occupancy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<ZoneOccupancy>, AppError> {
    auth.require(permissions::LOCATIONS_READ)?;
    Ok(Json(
        location_service::zone_occupancy(&state.ctx, &auth, zone_id).await?,
    ))
}

pub async fn get_bin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<BinResponse>, AppError> {
    auth.require(permissions::LOCATIONS_READ)?;
    Ok(Json(location_service::get_bin(&state.ctx, &auth, id).await?))
}

/// Block a bin for receiving. Requires `{ "reason": "…" }`.
pub async fn block_bin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<BlockBinRequest>,
) -> Result<Json<BinResponse>, AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    Ok(Json(
        location_service::block_bin(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn unblock_bin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<BinResponse>, AppError> {
    auth.require(permissions::LOCATIONS_WRITE)?;
    Ok(Json(
        location_service::unblock_bin(&state.ctx, &auth, id).await?,
    ))
}
