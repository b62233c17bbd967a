use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{MemoryStore, contains_ci};
use crate::error::AppError;
use crate::models::catalog::{Category, Item, Product, ProductFilter, Variant};
use crate::models::location::{Bin, Warehouse, Zone};
use crate::models::movement::{
    ItemMovement, MovementContext, MovementFilter, RegisterMovementRequest, plan_movement,
};
use crate::models::volume::{
    PackingLine, Volume, VolumeFilter, VolumeItem, check_pack_quantity,
};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{
    CatalogRepository, LocationRepository, MovementRepository, VolumeRepository,
};

#[async_trait]
impl LocationRepository for MemoryStore {
    async fn create_warehouse(&self, warehouse: &Warehouse) -> Result<(), AppError> {
        self.warehouses.insert(warehouse.clone()).await;
        Ok(())
    }

    async fn find_warehouse(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Warehouse>, AppError> {
        Ok(self
            .warehouses
            .find(tenant_id, |w| w.id == id && w.deleted_at.is_none())
            .await)
    }

    async fn find_warehouse_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<Warehouse>, AppError> {
        Ok(self
            .warehouses
            .find(tenant_id, |w| w.code == code && w.deleted_at.is_none())
            .await)
    }

    async fn list_warehouses(
        &self,
        tenant_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Warehouse>, AppError> {
        let mut warehouses = self
            .warehouses
            .filter(tenant_id, |w| w.deleted_at.is_none())
            .await;
        warehouses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(super::paginate(warehouses, page))
    }

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<(), AppError> {
        self.warehouses.replace(warehouse).await;
        Ok(())
    }

    async fn delete_warehouse(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let now = Utc::now();
        let changed = self
            .warehouses
            .update_where(tenant_id, |w| w.id == id && w.deleted_at.is_none(), |w| {
                w.deleted_at = Some(now);
                w.is_active = false;
            })
            .await;
        Ok(changed > 0)
    }

    async fn create_zone(&self, zone: &Zone) -> Result<(), AppError> {
        self.zones.insert(zone.clone()).await;
        Ok(())
    }

    async fn find_zone(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Zone>, AppError> {
        Ok(self.zones.get(tenant_id, id).await)
    }

    async fn find_zone_by_code(
        &self,
        tenant_id: Uuid,
        warehouse_id: Uuid,
        code: &str,
    ) -> Result<Option<Zone>, AppError> {
        Ok(self
            .zones
            .find(tenant_id, |z| z.warehouse_id == warehouse_id && z.code == code)
            .await)
    }

    async fn list_zones(&self, tenant_id: Uuid, warehouse_id: Uuid) -> Result<Vec<Zone>, AppError> {
        let mut zones = self
            .zones
            .filter(tenant_id, |z| z.warehouse_id == warehouse_id)
            .await;
        zones.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(zones)
    }

    async fn create_bins(&self, bins: &[Bin]) -> Result<(), AppError> {
        let _tx = self.tx.lock().await;
        for bin in bins {
            let taken = self
                .bins
                .find(bin.tenant_id, |b| b.zone_id == bin.zone_id && b.address == bin.address)
                .await;
            if taken.is_some() {
                return Err(AppError::Conflict(format!(
                    "Bin address {} already exists in this zone",
                    bin.address
                )));
            }
        }
        self.bins.insert_many(bins.iter().cloned()).await;
        Ok(())
    }

    async fn find_bin(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Bin>, AppError> {
        Ok(self.bins.get(tenant_id, id).await)
    }

    async fn list_bins(&self, tenant_id: Uuid, zone_id: Uuid) -> Result<Vec<Bin>, AppError> {
        let mut bins = self.bins.filter(tenant_id, |b| b.zone_id == zone_id).await;
        bins.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(bins)
    }

    async fn update_bin(&self, bin: &Bin) -> Result<(), AppError> {
        self.bins.replace(bin).await;
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn create_category(&self, category: &Category) -> Result<(), AppError> {
        self.categories.insert(category.clone()).await;
        Ok(())
    }

    async fn find_category(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Category>, AppError> {
        Ok(self
            .categories
            .find(tenant_id, |c| c.id == id && c.deleted_at.is_none())
            .await)
    }

    async fn find_category_by_slug(
        &self,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Category>, AppError> {
        Ok(self
            .categories
            .find(tenant_id, |c| c.slug == slug && c.deleted_at.is_none())
            .await)
    }

    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>, AppError> {
        let mut categories = self
            .categories
            .filter(tenant_id, |c| c.deleted_at.is_none())
            .await;
        categories.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(categories)
    }

    async fn update_category(&self, category: &Category) -> Result<(), AppError> {
        self.categories.replace(category).await;
        Ok(())
    }

    async fn delete_category(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let now = Utc::now();
        let changed = self
            .categories
            .update_where(tenant_id, |c| c.id == id && c.deleted_at.is_none(), |c| {
                c.deleted_at = Some(now)
            })
            .await;
        Ok(changed > 0)
    }

    async fn count_child_categories(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, AppError> {
        Ok(self
            .categories
            .count(tenant_id, |c| c.parent_id == Some(id) && c.deleted_at.is_none())
            .await)
    }

    async fn count_category_products(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, AppError> {
        Ok(self
            .products
            .count(tenant_id, |p| p.category_id == Some(id) && p.deleted_at.is_none())
            .await)
    }

    async fn create_product(&self, product: &Product) -> Result<(), AppError> {
        self.products.insert(product.clone()).await;
        Ok(())
    }

    async fn find_product(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self
            .products
            .find(tenant_id, |p| p.id == id && p.deleted_at.is_none())
            .await)
    }

    async fn list_products(
        &self,
        tenant_id: Uuid,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, AppError> {
        Ok(self
            .products
            .page(
                tenant_id,
                |p| {
                    p.deleted_at.is_none()
                        && filter.category_id.is_none_or(|c| p.category_id == Some(c))
                        && filter
                            .search
                            .as_deref()
                            .is_none_or(|s| contains_ci(&p.name, s))
                },
                page,
            )
            .await)
    }

    async fn update_product(&self, product: &Product) -> Result<(), AppError> {
        self.products.replace(product).await;
        Ok(())
    }

    async fn delete_product(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let now = Utc::now();
        let changed = self
            .products
            .update_where(tenant_id, |p| p.id == id && p.deleted_at.is_none(), |p| {
                p.deleted_at = Some(now);
                p.is_active = false;
            })
            .await;
        Ok(changed > 0)
    }

    async fn create_variant(&self, variant: &Variant) -> Result<(), AppError> {
        self.variants.insert(variant.clone()).await;
        Ok(())
    }

    async fn find_variant(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Variant>, AppError> {
        Ok(self.variants.get(tenant_id, id).await)
    }

    async fn find_variant_by_sku(
        &self,
        tenant_id: Uuid,
        sku: &str,
    ) -> Result<Option<Variant>, AppError> {
        Ok(self.variants.find(tenant_id, |v| v.sku == sku).await)
    }

    async fn list_variants(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<Variant>, AppError> {
        let mut variants = self
            .variants
            .filter(tenant_id, |v| v.product_id == product_id)
            .await;
        variants.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(variants)
    }

    async fn update_variant(&self, variant: &Variant) -> Result<(), AppError> {
        self.variants.replace(variant).await;
        Ok(())
    }

    async fn find_item(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Item>, AppError> {
        Ok(self.items.get(tenant_id, id).await)
    }

    async fn list_variant_items(
        &self,
        tenant_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Vec<Item>, AppError> {
        Ok(self
            .items
            .filter(tenant_id, |i| i.variant_id == variant_id)
            .await)
    }
}

#[async_trait]
impl MovementRepository for MemoryStore {
    async fn register_movement(
        &self,
        tenant_id: Uuid,
        performed_by: Uuid,
        request: &RegisterMovementRequest,
    ) -> Result<ItemMovement, AppError> {
        request.validate()?;
        let _tx = self.tx.lock().await;

        let source_item = match request.item_id {
            Some(id) => Some(
                self.items
                    .get(tenant_id, id)
                    .await
                    .ok_or(AppError::NotFound("Item"))?,
            ),
            None => None,
        };
        let source_bin = match &source_item {
            Some(item) => self.bins.get(tenant_id, item.bin_id).await,
            None => None,
        };
        let target_bin = match request.to_bin_id {
            Some(id) => Some(
                self.bins
                    .get(tenant_id, id)
                    .await
                    .ok_or(AppError::NotFound("Bin"))?,
            ),
            None => None,
        };
        let target_item = match (request.resolve_variant(source_item.as_ref()), &target_bin) {
            (Some(variant_id), Some(bin)) => {
                self.items
                    .find(tenant_id, |i| i.variant_id == variant_id && i.bin_id == bin.id)
                    .await
            }
            _ => None,
        };

        let outcome = plan_movement(
            tenant_id,
            performed_by,
            request,
            MovementContext {
                source_item,
                source_bin,
                target_bin,
                target_item,
            },
        )?;

        for item in &outcome.items {
            self.items.upsert(item).await;
        }
        for bin in &outcome.bins {
            self.bins.replace(bin).await;
        }
        self.movements.insert(outcome.movement.clone()).await;
        Ok(outcome.movement)
    }

    async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<Page<ItemMovement>, AppError> {
        Ok(self
            .movements
            .page(
                tenant_id,
                |m| {
                    filter.item_id.is_none_or(|id| m.item_id == id)
                        && filter.variant_id.is_none_or(|id| m.variant_id == id)
                        && filter.movement_type.is_none_or(|t| m.movement_type == t)
                },
                page,
            )
            .await)
    }
}

#[async_trait]
impl VolumeRepository for MemoryStore {
    async fn create_volume(&self, volume: &Volume) -> Result<(), AppError> {
        self.volumes.insert(volume.clone()).await;
        Ok(())
    }

    async fn find_volume(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Volume>, AppError> {
        Ok(self.volumes.get(tenant_id, id).await)
    }

    async fn list_volumes(
        &self,
        tenant_id: Uuid,
        filter: &VolumeFilter,
        page: PageRequest,
    ) -> Result<Page<Volume>, AppError> {
        Ok(self
            .volumes
            .page(
                tenant_id,
                |v| filter.status.is_none_or(|s| v.status == s),
                page,
            )
            .await)
    }

    async fn modify_volume(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: &(dyn for<'v> Fn(&'v mut Volume, usize) -> Result<(), AppError> + Send + Sync),
    ) -> Result<Volume, AppError> {
        let _tx = self.tx.lock().await;
        let mut volume = self
            .volumes
            .get(tenant_id, id)
            .await
            .ok_or(AppError::VolumeNotFound)?;
        let lines = self
            .volume_items
            .count(tenant_id, |i| i.volume_id == id)
            .await;
        change(&mut volume, lines as usize)?;
        self.volumes.replace(&volume).await;
        Ok(volume)
    }

    async fn pack_item(&self, line: &VolumeItem) -> Result<(), AppError> {
        let _tx = self.tx.lock().await;
        self.volumes
            .get(line.tenant_id, line.volume_id)
            .await
            .ok_or(AppError::VolumeNotFound)?
            .ensure_open()?;
        let item = self
            .items
            .get(line.tenant_id, line.item_id)
            .await
            .ok_or(AppError::NotFound("Item"))?;
        let packed: i64 = self
            .volume_items
            .filter(line.tenant_id, |i| {
                i.volume_id == line.volume_id && i.item_id == line.item_id
            })
            .await
            .iter()
            .map(|i| i64::from(i.quantity))
            .sum();
        check_pack_quantity(line.quantity, packed, item.quantity)?;

        self.volume_items.insert(line.clone()).await;
        Ok(())
    }

    async fn unpack_item(
        &self,
        tenant_id: Uuid,
        volume_id: Uuid,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let _tx = self.tx.lock().await;
        self.volumes
            .get(tenant_id, volume_id)
            .await
            .ok_or(AppError::VolumeNotFound)?
            .ensure_open()?;
        let removed = self
            .volume_items
            .remove_where(tenant_id, |i| i.id == id && i.volume_id == volume_id)
            .await;
        Ok(removed > 0)
    }

    async fn list_volume_items(
        &self,
        tenant_id: Uuid,
        volume_id: Uuid,
    ) -> Result<Vec<VolumeItem>, AppError> {
        let mut items = self
            .volume_items
            .filter(tenant_id, |i| i.volume_id == volume_id)
            .await;
        items.reverse();
        Ok(items)
    }

    async fn packing_lines(
        &self,
        tenant_id: Uuid,
        volume_id: Uuid,
    ) -> Result<Vec<PackingLine>, AppError> {
        let mut lines = Vec::new();
        for entry in self.list_volume_items(tenant_id, volume_id).await? {
            let Some(item) = self.items.get(tenant_id, entry.item_id).await else {
                continue;
            };
            let variant = self.variants.get(tenant_id, item.variant_id).await;
            let bin = self.bins.get(tenant_id, item.bin_id).await;
            lines.push(PackingLine {
                volume_item_id: entry.id,
                item_id: item.id,
                sku: variant.as_ref().map(|v| v.sku.clone()).unwrap_or_default(),
                variant_name: variant.map(|v| v.name).unwrap_or_default(),
                bin_address: bin.map(|b| b.address).unwrap_or_default(),
                quantity: entry.quantity,
            });
        }
        Ok(lines)
    }
}
