use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{MemoryStore, contains_ci};
use crate::error::AppError;
use crate::models::customer::{Customer, CustomerFilter};
use crate::models::promotion::{PromotionFilter, VariantPromotion};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{CustomerRepository, PromotionRepository};

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn create_customer(&self, customer: &Customer) -> Result<(), AppError> {
        self.customers.insert(customer.clone()).await;
        Ok(())
    }

    async fn find_customer(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Customer>, AppError> {
        Ok(self
            .customers
            .find(tenant_id, |c| c.id == id && c.deleted_at.is_none())
            .await)
    }

    async fn find_customer_by_document(
        &self,
        tenant_id: Uuid,
        document: &str,
    ) -> Result<Option<Customer>, AppError> {
        Ok(self
            .customers
            .find(tenant_id, |c| {
                c.document.as_deref() == Some(document) && c.deleted_at.is_none()
            })
            .await)
    }

    async fn list_customers(
        &self,
        tenant_id: Uuid,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>, AppError> {
        let mut customers = self
            .customers
            .filter(tenant_id, |c| {
                c.deleted_at.is_none()
                    && filter.customer_type.is_none_or(|t| c.customer_type == t)
                    && filter.search.as_deref().is_none_or(|s| {
                        contains_ci(&c.name, s)
                            || c.email.as_deref().is_some_and(|e| contains_ci(e, s))
                            || c.document.as_deref().is_some_and(|d| contains_ci(d, s))
                    })
            })
            .await;
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(super::paginate(customers, page))
    }

    async fn update_customer(&self, customer: &Customer) -> Result<(), AppError> {
        self.customers.replace(customer).await;
        Ok(())
    }

    async fn delete_customer(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let now = Utc::now();
        let changed = self
            .customers
            .update_where(tenant_id, |c| c.id == id && c.deleted_at.is_none(), |c| {
                c.deleted_at = Some(now);
                c.is_active = false;
            })
            .await;
        Ok(changed > 0)
    }
}

#[async_trait]
impl PromotionRepository for MemoryStore {
    async fn create_promotion(&self, promotion: &VariantPromotion) -> Result<(), AppError> {
        self.promotions.insert(promotion.clone()).await;
        Ok(())
    }

    async fn find_promotion(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<VariantPromotion>, AppError> {
        Ok(self
            .promotions
            .find(tenant_id, |p| p.id == id && p.deleted_at.is_none())
            .await)
    }

    async fn list_promotions(
        &self,
        tenant_id: Uuid,
        filter: &PromotionFilter,
        page: PageRequest,
    ) -> Result<Page<VariantPromotion>, AppError> {
        Ok(self
            .promotions
            .page(
                tenant_id,
                |p| {
                    p.deleted_at.is_none()
                        && filter.variant_id.is_none_or(|v| p.variant_id == v)
                        && filter.is_active.is_none_or(|a| p.is_active == a)
                },
                page,
            )
            .await)
    }

    async fn list_variant_promotions(
        &self,
        tenant_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Vec<VariantPromotion>, AppError> {
        let mut promotions = self
            .promotions
            .filter(tenant_id, |p| p.variant_id == variant_id && p.deleted_at.is_none())
            .await;
        promotions.sort_by_key(|p| p.starts_at);
        Ok(promotions)
    }

    async fn update_promotion(&self, promotion: &VariantPromotion) -> Result<(), AppError> {
        self.promotions.replace(promotion).await;
        Ok(())
    }

    async fn delete_promotion(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let now = Utc::now();
        let changed = self
            .promotions
            .update_where(tenant_id, |p| p.id == id && p.deleted_at.is_none(), |p| {
                p.deleted_at = Some(now);
                p.is_active = false;
            })
            .await;
        Ok(changed > 0)
    }
}
