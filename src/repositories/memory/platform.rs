use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::MemoryStore;
use crate::error::AppError;
use crate::models::audit::{AuditFilter, AuditLog};
use crate::models::notification::Notification;
use crate::models::webhook::{WebhookDelivery, WebhookEndpoint};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{AuditRepository, NotificationRepository, WebhookRepository};

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn insert_log(&self, log: &AuditLog) -> Result<(), AppError> {
        self.audit_logs.insert(log.clone()).await;
        Ok(())
    }

    async fn find_log(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditLog>, AppError> {
        Ok(self.audit_logs.get(tenant_id, id).await)
    }

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, AppError> {
        Ok(self
            .audit_logs
            .page(tenant_id, |log| filter.matches(log), page)
            .await)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.notifications.insert(notification.clone()).await;
        Ok(())
    }

    async fn find_notification(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, AppError> {
        Ok(self
            .notifications
            .find(tenant_id, |n| {
                n.id == id && n.user_id == user_id && n.deleted_at.is_none()
            })
            .await)
    }

    async fn list_notifications(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        Ok(self
            .notifications
            .page(
                tenant_id,
                |n| n.user_id == user_id && n.deleted_at.is_none() && !(unread_only && n.is_read),
                page,
            )
            .await)
    }

    async fn count_unread(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self
            .notifications
            .count(tenant_id, |n| {
                n.user_id == user_id && !n.is_read && n.deleted_at.is_none()
            })
            .await)
    }

    async fn update_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.notifications.replace(notification).await;
        Ok(())
    }

    async fn mark_all_read(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self
            .notifications
            .update_where(
                tenant_id,
                |n| n.user_id == user_id && !n.is_read && n.deleted_at.is_none(),
                Notification::mark_read,
            )
            .await)
    }

    async fn delete_notification(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let now = Utc::now();
        let changed = self
            .notifications
            .update_where(
                tenant_id,
                |n| n.id == id && n.user_id == user_id && n.deleted_at.is_none(),
                |n| n.deleted_at = Some(now),
            )
            .await;
        Ok(changed > 0)
    }
}

#[async_trait]
impl WebhookRepository for MemoryStore {
    async fn create_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), AppError> {
        self.webhook_endpoints.insert(endpoint.clone()).await;
        Ok(())
    }

    async fn list_active_endpoints(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<WebhookEndpoint>, AppError> {
        Ok(self
            .webhook_endpoints
            .filter(tenant_id, |e| e.is_active)
            .await)
    }

    async fn deactivate_endpoint(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let changed = self
            .webhook_endpoints
            .update_where(tenant_id, |e| e.id == id && e.is_active, |e| {
                e.is_active = false
            })
            .await;
        Ok(changed > 0)
    }

    async fn record_delivery(&self, delivery: &WebhookDelivery) -> Result<(), AppError> {
        self.webhook_deliveries.insert(delivery.clone()).await;
        Ok(())
    }

    async fn list_deliveries(
        &self,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<WebhookDelivery>, AppError> {
        Ok(self
            .webhook_deliveries
            .page(tenant_id, |d| d.endpoint_id == endpoint_id, page)
            .await)
    }
}
