use async_trait::async_trait;
use uuid::Uuid;

use super::{PgStore, conflict_on_unique, limit_offset};
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

const WAREHOUSE_COLUMNS: &str =
    "id, tenant_id, code, name, address, is_active, created_at, updated_at, deleted_at";
const ZONE_COLUMNS: &str = "id, tenant_id, warehouse_id, code, name, is_active, created_at";
const BIN_COLUMNS: &str = "id, tenant_id, zone_id, address, capacity, current_occupancy, \
    is_active, is_blocked, block_reason, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, tenant_id, parent_id, name, slug, description, \
    display_order, is_active, created_at, updated_at, deleted_at";
const PRODUCT_COLUMNS: &str =
    "id, tenant_id, category_id, name, description, is_active, created_at, updated_at, deleted_at";
const VARIANT_COLUMNS: &str =
    "id, tenant_id, product_id, sku, name, price_cents, is_active, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, tenant_id, variant_id, bin_id, quantity, created_at, updated_at";
const MOVEMENT_COLUMNS: &str = "id, tenant_id, item_id, variant_id, movement_type, quantity, \
    from_bin_id, to_bin_id, reason, reference, performed_by, created_at";
const VOLUME_COLUMNS: &str = "id, tenant_id, code, status, destination, notes, closed_at, \
    delivered_at, returned_at, created_at, updated_at";
const VOLUME_ITEM_COLUMNS: &str = "id, tenant_id, volume_id, item_id, quantity, added_at";

#[async_trait]
impl LocationRepository for PgStore {
    async fn create_warehouse(&self, warehouse: &Warehouse) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, tenant_id, code, name, address, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(warehouse.id)
        .bind(warehouse.tenant_id)
        .bind(&warehouse.code)
        .bind(&warehouse.name)
        .bind(&warehouse.address)
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .bind(warehouse.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Warehouse code already in use"))?;
        Ok(())
    }

    async fn find_warehouse(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Warehouse>, AppError> {
        Ok(sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_warehouse_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<Warehouse>, AppError> {
        Ok(sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE tenant_id = $1 AND code = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_warehouses(
        &self,
        tenant_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Warehouse>, AppError> {
        let (limit, offset) = limit_offset(page);
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM warehouses WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        let items = sqlx::query_as::<_, Warehouse>(&format!(
            r#"
            SELECT {WAREHOUSE_COLUMNS} FROM warehouses
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY code
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE warehouses SET name = $3, address = $4, is_active = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(warehouse.tenant_id)
        .bind(warehouse.id)
        .bind(&warehouse.name)
        .bind(&warehouse.address)
        .bind(warehouse.is_active)
        .bind(warehouse.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_warehouse(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE warehouses SET deleted_at = NOW(), is_active = false
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_zone(&self, zone: &Zone) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO zones (id, tenant_id, warehouse_id, code, name, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(zone.id)
        .bind(zone.tenant_id)
        .bind(zone.warehouse_id)
        .bind(&zone.code)
        .bind(&zone.name)
        .bind(zone.is_active)
        .bind(zone.created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Zone code already in use in this warehouse"))?;
        Ok(())
    }

    async fn find_zone(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Zone>, AppError> {
        Ok(sqlx::query_as::<_, Zone>(&format!(
            "SELECT {ZONE_COLUMNS} FROM zones WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_zone_by_code(
        &self,
        tenant_id: Uuid,
        warehouse_id: Uuid,
        code: &str,
    ) -> Result<Option<Zone>, AppError> {
        Ok(sqlx::query_as::<_, Zone>(&format!(
            "SELECT {ZONE_COLUMNS} FROM zones WHERE tenant_id = $1 AND warehouse_id = $2 AND code = $3"
        ))
        .bind(tenant_id)
        .bind(warehouse_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_zones(&self, tenant_id: Uuid, warehouse_id: Uuid) -> Result<Vec<Zone>, AppError> {
        Ok(sqlx::query_as::<_, Zone>(&format!(
            "SELECT {ZONE_COLUMNS} FROM zones WHERE tenant_id = $1 AND warehouse_id = $2 ORDER BY code"
        ))
        .bind(tenant_id)
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_bins(&self, bins: &[Bin]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for bin in bins {
            sqlx::query(
                r#"
                INSERT INTO bins (
                    id, tenant_id, zone_id, address, capacity, current_occupancy,
                    is_active, is_blocked, block_reason, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(bin.id)
            .bind(bin.tenant_id)
            .bind(bin.zone_id)
            .bind(&bin.address)
            .bind(bin.capacity)
            .bind(bin.current_occupancy)
            .bind(bin.is_active)
            .bind(bin.is_blocked)
            .bind(&bin.block_reason)
            .bind(bin.created_at)
            .bind(bin.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique("Bin address already exists in this zone"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_bin(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Bin>, AppError> {
        Ok(sqlx::query_as::<_, Bin>(&format!(
            "SELECT {BIN_COLUMNS} FROM bins WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_bins(&self, tenant_id: Uuid, zone_id: Uuid) -> Result<Vec<Bin>, AppError> {
        Ok(sqlx::query_as::<_, Bin>(&format!(
            "SELECT {BIN_COLUMNS} FROM bins WHERE tenant_id = $1 AND zone_id = $2 ORDER BY address"
        ))
        .bind(tenant_id)
        .bind(zone_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_bin(&self, bin: &Bin) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        write_bin(&mut conn, bin).await
    }
}

async fn write_bin(conn: &mut sqlx::PgConnection, bin: &Bin) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE bins
        SET current_occupancy = $3, is_active = $4, is_blocked = $5, block_reason = $6, updated_at = $7
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(bin.tenant_id)
    .bind(bin.id)
    .bind(bin.current_occupancy)
    .bind(bin.is_active)
    .bind(bin.is_blocked)
    .bind(&bin.block_reason)
    .bind(bin.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn create_category(&self, category: &Category) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO categories (
                id, tenant_id, parent_id, name, slug, description, display_order,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(category.id)
        .bind(category.tenant_id)
        .bind(category.parent_id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.display_order)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A category with this slug already exists"))?;
        Ok(())
    }

    async fn find_category(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Category>, AppError> {
        Ok(sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_category_by_slug(
        &self,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Category>, AppError> {
        Ok(sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE tenant_id = $1 AND slug = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>, AppError> {
        Ok(sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS} FROM categories
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY display_order, name
            "#
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_category(&self, category: &Category) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE categories
            SET parent_id = $3, name = $4, slug = $5, description = $6, display_order = $7,
                is_active = $8, updated_at = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(category.tenant_id)
        .bind(category.id)
        .bind(category.parent_id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.display_order)
        .bind(category.is_active)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A category with this slug already exists"))?;
        Ok(())
    }

    async fn delete_category(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE categories SET deleted_at = NOW() WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_child_categories(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories WHERE tenant_id = $1 AND parent_id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn count_category_products(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = $1 AND category_id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn create_product(&self, product: &Product) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, tenant_id, category_id, name, description, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id)
        .bind(product.tenant_id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_product(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_products(
        &self,
        tenant_id: Uuid,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, AppError> {
        const WHERE: &str = "tenant_id = $1 AND deleted_at IS NULL \
            AND ($2::uuid IS NULL OR category_id = $2) \
            AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%')";
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products WHERE {WHERE}"))
            .bind(tenant_id)
            .bind(filter.category_id)
            .bind(&filter.search)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {WHERE} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(filter.category_id)
        .bind(&filter.search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_product(&self, product: &Product) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE products SET category_id = $3, name = $4, description = $5, is_active = $6, updated_at = $7
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(product.tenant_id)
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_product(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE products SET deleted_at = NOW(), is_active = false
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_variant(&self, variant: &Variant) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO variants (id, tenant_id, product_id, sku, name, price_cents, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(variant.id)
        .bind(variant.tenant_id)
        .bind(variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.price_cents)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("SKU already in use"))?;
        Ok(())
    }

    async fn find_variant(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Variant>, AppError> {
        Ok(sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_variant_by_sku(
        &self,
        tenant_id: Uuid,
        sku: &str,
    ) -> Result<Option<Variant>, AppError> {
        Ok(sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE tenant_id = $1 AND sku = $2"
        ))
        .bind(tenant_id)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_variants(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<Variant>, AppError> {
        Ok(sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE tenant_id = $1 AND product_id = $2 ORDER BY sku"
        ))
        .bind(tenant_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_variant(&self, variant: &Variant) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE variants SET name = $3, price_cents = $4, is_active = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(variant.tenant_id)
        .bind(variant.id)
        .bind(&variant.name)
        .bind(variant.price_cents)
        .bind(variant.is_active)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_item(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Item>, AppError> {
        Ok(sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_variant_items(
        &self,
        tenant_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Vec<Item>, AppError> {
        Ok(sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 AND variant_id = $2 ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .bind(variant_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl MovementRepository for PgStore {
    async fn register_movement(
        &self,
        tenant_id: Uuid,
        performed_by: Uuid,
        request: &RegisterMovementRequest,
    ) -> Result<ItemMovement, AppError> {
        request.validate()?;
        let mut tx = self.pool.begin().await?;

        let source_item = match request.item_id {
            Some(id) => Some(
                sqlx::query_as::<_, Item>(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
                ))
                .bind(tenant_id)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound("Item"))?,
            ),
            None => None,
        };
        let source_bin = match &source_item {
            Some(item) => lock_bin(&mut tx, tenant_id, item.bin_id).await?,
            None => None,
        };
        let target_bin = match request.to_bin_id {
            Some(id) => Some(
                lock_bin(&mut tx, tenant_id, id)
                    .await?
                    .ok_or(AppError::NotFound("Bin"))?,
            ),
            None => None,
        };
        let target_item = match (request.resolve_variant(source_item.as_ref()), &target_bin) {
            (Some(variant_id), Some(bin)) => {
                sqlx::query_as::<_, Item>(&format!(
                    r#"
                    SELECT {ITEM_COLUMNS} FROM items
                    WHERE tenant_id = $1 AND variant_id = $2 AND bin_id = $3
                    FOR UPDATE
                    "#
                ))
                .bind(tenant_id)
                .bind(variant_id)
                .bind(bin.id)
                .fetch_optional(&mut *tx)
                .await?
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
            sqlx::query(
                r#"
                INSERT INTO items (id, tenant_id, variant_id, bin_id, quantity, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE
                SET quantity = EXCLUDED.quantity, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(item.id)
            .bind(item.tenant_id)
            .bind(item.variant_id)
            .bind(item.bin_id)
            .bind(item.quantity)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        for bin in &outcome.bins {
            write_bin(&mut tx, bin).await?;
        }

        let movement = &outcome.movement;
        sqlx::query(
            r#"
            INSERT INTO item_movements (
                id, tenant_id, item_id, variant_id, movement_type, quantity, from_bin_id,
                to_bin_id, reason, reference, performed_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(movement.id)
        .bind(movement.tenant_id)
        .bind(movement.item_id)
        .bind(movement.variant_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.from_bin_id)
        .bind(movement.to_bin_id)
        .bind(&movement.reason)
        .bind(&movement.reference)
        .bind(movement.performed_by)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(outcome.movement)
    }

    async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<Page<ItemMovement>, AppError> {
        const WHERE: &str = "tenant_id = $1 \
            AND ($2::uuid IS NULL OR item_id = $2) \
            AND ($3::uuid IS NULL OR variant_id = $3) \
            AND ($4::text IS NULL OR movement_type = $4)";
        let (limit, offset) = limit_offset(page);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM item_movements WHERE {WHERE}"))
                .bind(tenant_id)
                .bind(filter.item_id)
                .bind(filter.variant_id)
                .bind(filter.movement_type)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, ItemMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM item_movements WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(tenant_id)
        .bind(filter.item_id)
        .bind(filter.variant_id)
        .bind(filter.movement_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }
}

async fn lock_bin(
    conn: &mut sqlx::PgConnection,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Option<Bin>, AppError> {
    Ok(sqlx::query_as::<_, Bin>(&format!(
        "SELECT {BIN_COLUMNS} FROM bins WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(conn)
    .await?)
}

#[async_trait]
impl VolumeRepository for PgStore {
    async fn create_volume(&self, volume: &Volume) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO volumes (id, tenant_id, code, status, destination, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(volume.id)
        .bind(volume.tenant_id)
        .bind(&volume.code)
        .bind(volume.status)
        .bind(&volume.destination)
        .bind(&volume.notes)
        .bind(volume.created_at)
        .bind(volume.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Volume code already in use"))?;
        Ok(())
    }

    async fn find_volume(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Volume>, AppError> {
        Ok(sqlx::query_as::<_, Volume>(&format!(
            "SELECT {VOLUME_COLUMNS} FROM volumes WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_volumes(
        &self,
        tenant_id: Uuid,
        filter: &VolumeFilter,
        page: PageRequest,
    ) -> Result<Page<Volume>, AppError> {
        const WHERE: &str = "tenant_id = $1 AND ($2::text IS NULL OR status = $2)";
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM volumes WHERE {WHERE}"))
            .bind(tenant_id)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Volume>(&format!(
            "SELECT {VOLUME_COLUMNS} FROM volumes WHERE {WHERE} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(tenant_id)
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn modify_volume(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: &(dyn for<'v> Fn(&'v mut Volume, usize) -> Result<(), AppError> + Send + Sync),
    ) -> Result<Volume, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut volume = lock_volume(&mut tx, tenant_id, id).await?;
        let lines: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM volume_items WHERE tenant_id = $1 AND volume_id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        change(&mut volume, lines as usize)?;

        sqlx::query(
            r#"
            UPDATE volumes
            SET status = $3, destination = $4, notes = $5, closed_at = $6, delivered_at = $7,
                returned_at = $8, updated_at = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(volume.tenant_id)
        .bind(volume.id)
        .bind(volume.status)
        .bind(&volume.destination)
        .bind(&volume.notes)
        .bind(volume.closed_at)
        .bind(volume.delivered_at)
        .bind(volume.returned_at)
        .bind(volume.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(volume)
    }

    async fn pack_item(&self, line: &VolumeItem) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        lock_volume(&mut tx, line.tenant_id, line.volume_id)
            .await?
            .ensure_open()?;
        // FOR SHARE holds off movements on the item until the line is in.
        let in_stock: i32 = sqlx::query_scalar(
            "SELECT quantity FROM items WHERE tenant_id = $1 AND id = $2 FOR SHARE",
        )
        .bind(line.tenant_id)
        .bind(line.item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Item"))?;
        let packed: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM volume_items
            WHERE tenant_id = $1 AND volume_id = $2 AND item_id = $3
            "#,
        )
        .bind(line.tenant_id)
        .bind(line.volume_id)
        .bind(line.item_id)
        .fetch_one(&mut *tx)
        .await?;
        check_pack_quantity(line.quantity, packed, in_stock)?;

        sqlx::query(
            r#"
            INSERT INTO volume_items (id, tenant_id, volume_id, item_id, quantity, added_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(line.id)
        .bind(line.tenant_id)
        .bind(line.volume_id)
        .bind(line.item_id)
        .bind(line.quantity)
        .bind(line.added_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn unpack_item(
        &self,
        tenant_id: Uuid,
        volume_id: Uuid,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        lock_volume(&mut tx, tenant_id, volume_id)
            .await?
            .ensure_open()?;
        let result = sqlx::query(
            "DELETE FROM volume_items WHERE tenant_id = $1 AND volume_id = $2 AND id = $3",
        )
        .bind(tenant_id)
        .bind(volume_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_volume_items(
        &self,
        tenant_id: Uuid,
        volume_id: Uuid,
    ) -> Result<Vec<VolumeItem>, AppError> {
        Ok(sqlx::query_as::<_, VolumeItem>(&format!(
            "SELECT {VOLUME_ITEM_COLUMNS} FROM volume_items WHERE tenant_id = $1 AND volume_id = $2 ORDER BY added_at"
        ))
        .bind(tenant_id)
        .bind(volume_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn packing_lines(
        &self,
        tenant_id: Uuid,
        volume_id: Uuid,
    ) -> Result<Vec<PackingLine>, AppError> {
        Ok(sqlx::query_as::<_, PackingLine>(
            r#"
            SELECT vi.id AS volume_item_id, i.id AS item_id, v.sku, v.name AS variant_name,
                   b.address AS bin_address, vi.quantity
            FROM volume_items vi
            JOIN items i ON i.id = vi.item_id
            JOIN variants v ON v.id = i.variant_id
            JOIN bins b ON b.id = i.bin_id
            WHERE vi.tenant_id = $1 AND vi.volume_id = $2
            ORDER BY vi.added_at
            "#,
        )
        .bind(tenant_id)
        .bind(volume_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

async fn lock_volume(
    conn: &mut sqlx::PgConnection,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Volume, AppError> {
    sqlx::query_as::<_, Volume>(&format!(
        "SELECT {VOLUME_COLUMNS} FROM volumes WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::VolumeNotFound)
}
