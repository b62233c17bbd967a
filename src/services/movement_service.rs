//! Stock movements between bins.

use super::Context;
use super::catalog_service::get_variant;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::movement::{ItemMovement, MovementFilter, RegisterMovementRequest};
use crate::models::webhook::events;
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "stock.movements";

pub async fn register_movement(
    ctx: &Context,
    auth: &AuthContext,
    request: RegisterMovementRequest,
) -> Result<ItemMovement, AppError> {
    request.validate()?;
    if request.item_id.is_none() {
        if let Some(variant_id) = request.variant_id {
            get_variant(ctx, auth, variant_id).await?;
        }
    }

    let movement = ctx
        .repos
        .movements
        .register_movement(auth.tenant_id, auth.user_id, &request)
        .await?;

    tracing::info!(
        movement_id = %movement.id,
        movement_type = %movement.movement_type,
        quantity = movement.quantity,
        "Stock movement registered"
    );
    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "item_movement",
            movement.id,
            format!("{} of {} unit(s)", movement.movement_type, movement.quantity),
        )
        .with_new(&movement),
    )
    .await;
    ctx.emit(auth.tenant_id, events::STOCK_MOVEMENT_REGISTERED, &movement);
    Ok(movement)
}

pub async fn list_movements(
    ctx: &Context,
    auth: &AuthContext,
    filter: &MovementFilter,
    page: PageRequest,
) -> Result<Page<ItemMovement>, AppError> {
    ctx.repos
        .movements
        .list_movements(auth.tenant_id, filter, page)
        .await
}
