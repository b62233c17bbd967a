//! Packing stock items into shipping volumes and tracking them to delivery.

use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::volume::{
    AddVolumeItemRequest, CreateVolumeRequest, PackingList, Volume, VolumeDetail, VolumeFilter,
    VolumeItem,
};
use crate::models::webhook::events;
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "stock.volumes";

pub async fn create_volume(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateVolumeRequest,
) -> Result<Volume, AppError> {
    let volume = Volume::new(auth.tenant_id, request);
    ctx.repos.volumes.create_volume(&volume).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "volume",
            volume.id,
            format!("Volume {} opened", volume.code),
        )
        .with_new(&volume),
    )
    .await;
    Ok(volume)
}

async fn find_volume(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Volume, AppError> {
    ctx.repos
        .volumes
        .find_volume(auth.tenant_id, id)
        .await?
        .ok_or(AppError::VolumeNotFound)
}

pub async fn get_volume(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VolumeDetail, AppError> {
    let volume = find_volume(ctx, auth, id).await?;
    let items = ctx
        .repos
        .volumes
        .list_volume_items(auth.tenant_id, volume.id)
        .await?;
    Ok(VolumeDetail { volume, items })
}

pub async fn list_volumes(
    ctx: &Context,
    auth: &AuthContext,
    filter: &VolumeFilter,
    page: PageRequest,
) -> Result<Page<Volume>, AppError> {
    ctx.repos
        .volumes
        .list_volumes(auth.tenant_id, filter, page)
        .await
}

pub async fn add_item(
    ctx: &Context,
    auth: &AuthContext,
    volume_id: Uuid,
    request: AddVolumeItemRequest,
) -> Result<VolumeItem, AppError> {
    let volume = find_volume(ctx, auth, volume_id).await?;
    volume.ensure_open()?;
    if request.quantity < 1 {
        return Err(AppError::bad_request("Quantity must be at least 1"));
    }

    let entry = VolumeItem::new(&volume, request.item_id, request.quantity);
    ctx.repos.volumes.pack_item(&entry).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "volume",
            volume.id,
            format!("{} unit(s) packed into {}", entry.quantity, volume.code),
        )
        .with_new(&entry),
    )
    .await;
    Ok(entry)
}

pub async fn remove_item(
    ctx: &Context,
    auth: &AuthContext,
    volume_id: Uuid,
    volume_item_id: Uuid,
) -> Result<(), AppError> {
    let volume = find_volume(ctx, auth, volume_id).await?;
    let removed = ctx
        .repos
        .volumes
        .unpack_item(auth.tenant_id, volume.id, volume_item_id)
        .await?;
    if !removed {
        return Err(AppError::NotFound("Volume item"));
    }

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "volume",
            volume.id,
            format!("Line removed from {}", volume.code),
        ),
    )
    .await;
    Ok(())
}

/// Apply a lifecycle step under the volume lock, then audit.
async fn transition(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    description: &str,
    step: &(dyn Fn(&mut Volume, usize) -> Result<(), AppError> + Send + Sync),
) -> Result<Volume, AppError> {
    let before = find_volume(ctx, auth, id).await?;
    let volume = ctx
        .repos
        .volumes
        .modify_volume(auth.tenant_id, id, step)
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "volume",
            id,
            format!("Volume {} {description}", volume.code),
        )
        .with_old(&before)
        .with_new(&volume),
    )
    .await;
    Ok(volume)
}

pub async fn close_volume(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Volume, AppError> {
    transition(ctx, auth, id, "closed", &|v, items| v.close(items)).await
}

pub async fn reopen_volume(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Volume, AppError> {
    transition(ctx, auth, id, "reopened", &|v, _| v.reopen()).await
}

pub async fn deliver_volume(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Volume, AppError> {
    let volume = transition(ctx, auth, id, "delivered", &|v, _| v.deliver()).await?;
    ctx.emit(auth.tenant_id, events::VOLUME_DELIVERED, &volume);
    Ok(volume)
}

pub async fn return_volume(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Volume, AppError> {
    let volume = transition(ctx, auth, id, "returned", &|v, _| v.mark_returned()).await?;
    ctx.emit(auth.tenant_id, events::VOLUME_RETURNED, &volume);
    Ok(volume)
}

pub async fn packing_list(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<PackingList, AppError> {
    let volume = find_volume(ctx, auth, id).await?;
    let lines = ctx
        .repos
        .volumes
        .packing_lines(auth.tenant_id, volume.id)
        .await?;
    Ok(PackingList::new(&volume, lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::volume::VolumeStatus;
    use crate::services::catalog_service::tests::variant;
    use crate::services::location_service::tests::stock_layout;
    use crate::services::movement_service::{register_movement, tests::inbound};
    use crate::services::testing;

    async fn setup() -> (Context, AuthContext, Uuid) {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let (_, bin) = stock_layout(&ctx, &auth, 100).await;
        let v = variant(&ctx, &auth, "BOX-1").await;
        let movement = register_movement(&ctx, &auth, inbound(v.id, bin.id, 20))
            .await
            .unwrap();
        (ctx, auth, movement.item_id)
    }

    fn empty() -> CreateVolumeRequest {
        CreateVolumeRequest {
            destination: Some("Customer dock".into()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn full_lifecycle_with_packing_list() {
        let (ctx, auth, item_id) = setup().await;
        let volume = create_volume(&ctx, &auth, empty()).await.unwrap();
        assert!(volume.code.starts_with("VOL-"));

        add_item(&ctx, &auth, volume.id, AddVolumeItemRequest { item_id, quantity: 5 })
            .await
            .unwrap();
        add_item(&ctx, &auth, volume.id, AddVolumeItemRequest { item_id, quantity: 3 })
            .await
            .unwrap();

        let list = packing_list(&ctx, &auth, volume.id).await.unwrap();
        assert_eq!(list.total_lines, 2);
        assert_eq!(list.total_quantity, 8);
        assert_eq!(list.lines[0].sku, "BOX-1");
        assert_eq!(list.lines[0].bin_address, "A-01");

        close_volume(&ctx, &auth, volume.id).await.unwrap();
        let delivered = deliver_volume(&ctx, &auth, volume.id).await.unwrap();
        assert_eq!(delivered.status, VolumeStatus::Delivered);
        assert!(delivered.delivered_at.is_some());

        let returned = return_volume(&ctx, &auth, volume.id).await.unwrap();
        assert_eq!(returned.status, VolumeStatus::Returned);
    }

    #[tokio::test]
    async fn empty_volumes_cannot_close() {
        let (ctx, auth, _) = setup().await;
        let volume = create_volume(&ctx, &auth, empty()).await.unwrap();
        assert!(matches!(
            close_volume(&ctx, &auth, volume.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn quantity_is_bounded_by_stock() {
        let (ctx, auth, item_id) = setup().await;
        let volume = create_volume(&ctx, &auth, empty()).await.unwrap();

        for quantity in [0, 21] {
            let result =
                add_item(&ctx, &auth, volume.id, AddVolumeItemRequest { item_id, quantity }).await;
            assert!(matches!(result, Err(AppError::BadRequest(_))));
        }
        let missing = add_item(
            &ctx,
            &auth,
            volume.id,
            AddVolumeItemRequest {
                item_id: Uuid::new_v4(),
                quantity: 1,
            },
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound("Item"))));
    }

    #[tokio::test]
    async fn repeated_lines_share_the_item_stock() {
        let (ctx, auth, item_id) = setup().await;
        let volume = create_volume(&ctx, &auth, empty()).await.unwrap();
        let pack = |quantity| {
            add_item(&ctx, &auth, volume.id, AddVolumeItemRequest { item_id, quantity })
        };

        pack(15).await.unwrap();
        assert!(matches!(pack(6).await, Err(AppError::BadRequest(_))));
        pack(5).await.unwrap();
        assert!(matches!(pack(1).await, Err(AppError::BadRequest(_))));

        let list = packing_list(&ctx, &auth, volume.id).await.unwrap();
        assert_eq!(list.total_lines, 2);
        assert_eq!(list.total_quantity, 20);
    }

    #[tokio::test]
    async fn closed_volumes_are_frozen_until_reopened() {
        let (ctx, auth, item_id) = setup().await;
        let volume = create_volume(&ctx, &auth, empty()).await.unwrap();
        let line = add_item(&ctx, &auth, volume.id, AddVolumeItemRequest { item_id, quantity: 2 })
            .await
            .unwrap();
        close_volume(&ctx, &auth, volume.id).await.unwrap();

        assert!(remove_item(&ctx, &auth, volume.id, line.id).await.is_err());

        reopen_volume(&ctx, &auth, volume.id).await.unwrap();
        remove_item(&ctx, &auth, volume.id, line.id).await.unwrap();
        assert!(matches!(
            remove_item(&ctx, &auth, volume.id, line.id).await,
            Err(AppError::NotFound("Volume item"))
        ));
        assert!(get_volume(&ctx, &auth, volume.id).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn missing_volume_has_its_own_error() {
        let (ctx, auth, _) = setup().await;
        assert!(matches!(
            get_volume(&ctx, &auth, Uuid::new_v4()).await,
            Err(AppError::VolumeNotFound)
        ));
    }
}
