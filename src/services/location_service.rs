//! Warehouses, zones and bins.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::location::{
    Bin, BinResponse, BlockBinRequest, CreateBinRequest, CreateWarehouseRequest,
    CreateZoneRequest, GenerateBinsRequest, GenerateBinsResponse, UpdateWarehouseRequest,
    Warehouse, Zone, ZoneOccupancy,
};
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "stock.locations";

pub async fn create_warehouse(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateWarehouseRequest,
) -> Result<Warehouse, AppError> {
    let warehouse = Warehouse::new(auth.tenant_id, request)?;
    let taken = ctx
        .repos
        .locations
        .find_warehouse_by_code(auth.tenant_id, &warehouse.code)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict(format!(
            "Warehouse code {} already in use",
            warehouse.code
        )));
    }
    ctx.repos.locations.create_warehouse(&warehouse).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "warehouse",
            warehouse.id,
            format!("Warehouse {} created", warehouse.code),
        )
        .with_new(&warehouse),
    )
    .await;
    Ok(warehouse)
}

pub async fn get_warehouse(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Warehouse, AppError> {
    ctx.repos
        .locations
        .find_warehouse(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Warehouse"))
}

pub async fn list_warehouses(
    ctx: &Context,
    auth: &AuthContext,
    page: PageRequest,
) -> Result<Page<Warehouse>, AppError> {
    ctx.repos.locations.list_warehouses(auth.tenant_id, page).await
}

pub async fn update_warehouse(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateWarehouseRequest,
) -> Result<Warehouse, AppError> {
    let mut warehouse = get_warehouse(ctx, auth, id).await?;
    let before = warehouse.clone();

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("Warehouse name is required"));
        }
        warehouse.name = name;
    }
    if let Some(address) = request.address {
        warehouse.address = Some(address);
    }
    if let Some(active) = request.is_active {
        warehouse.is_active = active;
    }
    warehouse.updated_at = Utc::now();
    ctx.repos.locations.update_warehouse(&warehouse).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "warehouse",
            id,
            format!("Warehouse {} updated", warehouse.code),
        )
        .with_old(&before)
        .with_new(&warehouse),
    )
    .await;
    Ok(warehouse)
}

pub async fn delete_warehouse(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let warehouse = get_warehouse(ctx, auth, id).await?;
    if !ctx.repos.locations.delete_warehouse(auth.tenant_id, id).await? {
        return Err(AppError::NotFound("Warehouse"));
    }

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Delete,
            MODULE,
            "warehouse",
            id,
            format!("Warehouse {} deleted", warehouse.code),
        )
        .with_old(&warehouse),
    )
    .await;
    Ok(())
}

pub async fn create_zone(
    ctx: &Context,
    auth: &AuthContext,
    warehouse_id: Uuid,
    request: CreateZoneRequest,
) -> Result<Zone, AppError> {
    let warehouse = get_warehouse(ctx, auth, warehouse_id).await?;
    let zone = Zone::new(&warehouse, request)?;
    let taken = ctx
        .repos
        .locations
        .find_zone_by_code(auth.tenant_id, warehouse.id, &zone.code)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict(format!(
            "Zone code {} already exists in warehouse {}",
            zone.code, warehouse.code
        )));
    }
    ctx.repos.locations.create_zone(&zone).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "zone",
            zone.id,
            format!("Zone {} created in {}", zone.code, warehouse.code),
        )
        .with_new(&zone),
    )
    .await;
    Ok(zone)
}

pub async fn list_zones(
    ctx: &Context,
    auth: &AuthContext,
    warehouse_id: Uuid,
) -> Result<Vec<Zone>, AppError> {
    get_warehouse(ctx, auth, warehouse_id).await?;
    ctx.repos.locations.list_zones(auth.tenant_id, warehouse_id).await
}

async fn get_zone(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Zone, AppError> {
    ctx.repos
        .locations
        .find_zone(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Zone"))
}

pub async fn create_bin(
    ctx: &Context,
    auth: &AuthContext,
    zone_id: Uuid,
    request: CreateBinRequest,
) -> Result<BinResponse, AppError> {
    let zone = get_zone(ctx, auth, zone_id).await?;
    let bin = Bin::new(&zone, request.address, request.capacity)?;
    let existing = ctx.repos.locations.list_bins(auth.tenant_id, zone.id).await?;
    if existing.iter().any(|b| b.address == bin.address) {
        return Err(AppError::Conflict(format!(
            "Bin address {} already exists in this zone",
            bin.address
        )));
    }
    ctx.repos
        .locations
        .create_bins(std::slice::from_ref(&bin))
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "bin",
            bin.id,
            format!("Bin {} created", bin.address),
        )
        .with_new(&bin),
    )
    .await;
    Ok(bin.into())
}

/// Create a grid of bins, skipping addresses the zone already has.
pub async fn generate_bins(
    ctx: &Context,
    auth: &AuthContext,
    zone_id: Uuid,
    request: GenerateBinsRequest,
) -> Result<GenerateBinsResponse, AppError> {
    let zone = get_zone(ctx, auth, zone_id).await?;
    let addresses = request.addresses(&zone.code)?;
    let existing: HashSet<String> = ctx
        .repos
        .locations
        .list_bins(auth.tenant_id, zone.id)
        .await?
        .into_iter()
        .map(|b| b.address)
        .collect();

    let total = addresses.len();
    let bins = addresses
        .into_iter()
        .filter(|address| !existing.contains(address))
        .map(|address| Bin::new(&zone, address, request.capacity))
        .collect::<Result<Vec<_>, _>>()?;
    if !bins.is_empty() {
        ctx.repos.locations.create_bins(&bins).await?;
    }

    let created = bins.len();
    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "zone",
            zone.id,
            format!("{created} bin(s) generated in zone {}", zone.code),
        ),
    )
    .await;
    tracing::info!(zone_id = %zone.id, created, skipped = total - created, "Bins generated");

    Ok(GenerateBinsResponse {
        created,
        skipped: total - created,
        bins: bins.into_iter().map(Into::into).collect(),
    })
}

pub async fn list_bins(
    ctx: &Context,
    auth: &AuthContext,
    zone_id: Uuid,
) -> Result<Vec<BinResponse>, AppError> {
    get_zone(ctx, auth, zone_id).await?;
    Ok(ctx
        .repos
        .locations
        .list_bins(auth.tenant_id, zone_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

async fn find_bin(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Bin, AppError> {
    ctx.repos
        .locations
        .find_bin(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Bin"))
}

pub async fn get_bin(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<BinResponse, AppError> {
    Ok(find_bin(ctx, auth, id).await?.into())
}

pub async fn block_bin(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: BlockBinRequest,
) -> Result<BinResponse, AppError> {
    let mut bin = find_bin(ctx, auth, id).await?;
    bin.block(request.reason)?;
    ctx.repos.locations.update_bin(&bin).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "bin",
            id,
            format!(
                "Bin {} blocked: {}",
                bin.address,
                bin.block_reason.as_deref().unwrap_or_default()
            ),
        )
        .with_new(&bin),
    )
    .await;
    Ok(bin.into())
}

pub async fn unblock_bin(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<BinResponse, AppError> {
    let mut bin = find_bin(ctx, auth, id).await?;
    bin.unblock()?;
    ctx.repos.locations.update_bin(&bin).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "bin",
            id,
            format!("Bin {} unblocked", bin.address),
        )
        .with_new(&bin),
    )
    .await;
    Ok(bin.into())
}

pub async fn zone_occupancy(
    ctx: &Context,
    auth: &AuthContext,
    zone_id: Uuid,
) -> Result<ZoneOccupancy, AppError> {
    get_zone(ctx, auth, zone_id).await?;
    let bins = ctx.repos.locations.list_bins(auth.tenant_id, zone_id).await?;
    Ok(ZoneOccupancy::compute(zone_id, &bins))
}
