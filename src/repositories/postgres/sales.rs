use async_trait::async_trait;
use uuid::Uuid;

use super::{PgStore, conflict_on_unique, limit_offset};
use crate::error::AppError;
use crate::models::customer::{Customer, CustomerFilter};
use crate::models::promotion::{PromotionFilter, VariantPromotion};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{CustomerRepository, PromotionRepository};

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, document, email, phone, customer_type, \
    is_active, created_at, updated_at, deleted_at";
const PROMOTION_COLUMNS: &str = "id, tenant_id, variant_id, name, discount_type, discount_value, \
    starts_at, ends_at, is_active, notes, created_at, updated_at, deleted_at";

#[async_trait]
impl CustomerRepository for PgStore {
    async fn create_customer(&self, customer: &Customer) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, name, document, email, phone, customer_type, is_active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(customer.id)
        .bind(customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.document)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.customer_type)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A customer with this document already exists"))?;
        Ok(())
    }

    async fn find_customer(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Customer>, AppError> {
        Ok(sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_customer_by_document(
        &self,
        tenant_id: Uuid,
        document: &str,
    ) -> Result<Option<Customer>, AppError> {
        Ok(sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant_id = $1 AND document = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(document)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_customers(
        &self,
        tenant_id: Uuid,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>, AppError> {
        const WHERE: &str = "tenant_id = $1 AND deleted_at IS NULL \
            AND ($2::text IS NULL OR customer_type = $2) \
            AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' \
                 OR email ILIKE '%' || $3 || '%' OR document ILIKE '%' || $3 || '%')";
        let (limit, offset) = limit_offset(page);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM customers WHERE {WHERE}"))
                .bind(tenant_id)
                .bind(filter.customer_type)
                .bind(&filter.search)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE {WHERE} ORDER BY name LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(filter.customer_type)
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

    async fn update_customer(&self, customer: &Customer) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE customers
            SET name = $3, document = $4, email = $5, phone = $6, customer_type = $7,
                is_active = $8, updated_at = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(customer.tenant_id)
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.document)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.customer_type)
        .bind(customer.is_active)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A customer with this document already exists"))?;
        Ok(())
    }

    async fn delete_customer(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET deleted_at = NOW(), is_active = false
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PromotionRepository for PgStore {
    async fn create_promotion(&self, promotion: &VariantPromotion) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO variant_promotions (
                id, tenant_id, variant_id, name, discount_type, discount_value, starts_at,
                ends_at, is_active, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(promotion.id)
        .bind(promotion.tenant_id)
        .bind(promotion.variant_id)
        .bind(&promotion.name)
        .bind(promotion.discount_type)
        .bind(promotion.discount_value)
        .bind(promotion.starts_at)
        .bind(promotion.ends_at)
        .bind(promotion.is_active)
        .bind(&promotion.notes)
        .bind(promotion.created_at)
        .bind(promotion.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_promotion(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<VariantPromotion>, AppError> {
        Ok(sqlx::query_as::<_, VariantPromotion>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM variant_promotions WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_promotions(
        &self,
        tenant_id: Uuid,
        filter: &PromotionFilter,
        page: PageRequest,
    ) -> Result<Page<VariantPromotion>, AppError> {
        const WHERE: &str = "tenant_id = $1 AND deleted_at IS NULL \
            AND ($2::uuid IS NULL OR variant_id = $2) \
            AND ($3::boolean IS NULL OR is_active = $3)";
        let (limit, offset) = limit_offset(page);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM variant_promotions WHERE {WHERE}"))
                .bind(tenant_id)
                .bind(filter.variant_id)
                .bind(filter.is_active)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, VariantPromotion>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM variant_promotions WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(filter.variant_id)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn list_variant_promotions(
        &self,
        tenant_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Vec<VariantPromotion>, AppError> {
        Ok(sqlx::query_as::<_, VariantPromotion>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS} FROM variant_promotions
            WHERE tenant_id = $1 AND variant_id = $2 AND deleted_at IS NULL
            ORDER BY starts_at
            "#
        ))
        .bind(tenant_id)
        .bind(variant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_promotion(&self, promotion: &VariantPromotion) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE variant_promotions
            SET name = $3, discount_type = $4, discount_value = $5, starts_at = $6, ends_at = $7,
                is_active = $8, notes = $9, updated_at = $10
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(promotion.tenant_id)
        .bind(promotion.id)
        .bind(&promotion.name)
        .bind(promotion.discount_type)
        .bind(promotion.discount_value)
        .bind(promotion.starts_at)
        .bind(promotion.ends_at)
        .bind(promotion.is_active)
        .bind(&promotion.notes)
        .bind(promotion.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_promotion(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE variant_promotions SET deleted_at = NOW(), is_active = false
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
