use async_trait::async_trait;
use uuid::Uuid;

use super::{PgStore, limit_offset};
use crate::error::AppError;
use crate::models::audit::{AuditFilter, AuditLog};
use crate::models::notification::Notification;
use crate::models::webhook::{WebhookDelivery, WebhookEndpoint};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{AuditRepository, NotificationRepository, WebhookRepository};

const AUDIT_COLUMNS: &str = "id, tenant_id, user_id, action, module, entity, entity_id, \
    description, old_data, new_data, created_at, signature";
const NOTIFICATION_COLUMNS: &str = "id, tenant_id, user_id, title, message, notification_type, \
    priority, entity_type, entity_id, action_url, is_read, read_at, created_at, deleted_at";
const ENDPOINT_COLUMNS: &str = "id, tenant_id, url, secret, events, is_active, created_by, created_at";
const DELIVERY_COLUMNS: &str = "id, tenant_id, endpoint_id, event_id, event_type, payload, \
    sent_at, response_status, response_body, error";

#[async_trait]
impl AuditRepository for PgStore {
    async fn insert_log(&self, log: &AuditLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, tenant_id, user_id, action, module, entity, entity_id, description,
                old_data, new_data, created_at, signature
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(log.id)
        .bind(log.tenant_id)
        .bind(log.user_id)
        .bind(log.action)
        .bind(&log.module)
        .bind(&log.entity)
        .bind(log.entity_id)
        .bind(&log.description)
        .bind(&log.old_data)
        .bind(&log.new_data)
        .bind(log.created_at)
        .bind(&log.signature)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_log(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditLog>, AppError> {
        Ok(sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, AppError> {
        const WHERE: &str = "tenant_id = $1 \
            AND ($2::text IS NULL OR module = $2) \
            AND ($3::text IS NULL OR entity = $3) \
            AND ($4::uuid IS NULL OR entity_id = $4) \
            AND ($5::uuid IS NULL OR user_id = $5) \
            AND ($6::text IS NULL OR action = $6) \
            AND ($7::timestamptz IS NULL OR created_at >= $7) \
            AND ($8::timestamptz IS NULL OR created_at <= $8)";
        let (limit, offset) = limit_offset(page);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_logs WHERE {WHERE}"))
                .bind(tenant_id)
                .bind(&filter.module)
                .bind(&filter.entity)
                .bind(filter.entity_id)
                .bind(filter.user_id)
                .bind(filter.action)
                .bind(filter.from)
                .bind(filter.to)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $9 OFFSET $10"
        ))
        .bind(tenant_id)
        .bind(&filter.module)
        .bind(&filter.entity)
        .bind(filter.entity_id)
        .bind(filter.user_id)
        .bind(filter.action)
        .bind(filter.from)
        .bind(filter.to)
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

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, tenant_id, user_id, title, message, notification_type, priority,
                entity_type, entity_id, action_url, is_read, read_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(notification.id)
        .bind(notification.tenant_id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.notification_type)
        .bind(notification.priority)
        .bind(&notification.entity_type)
        .bind(notification.entity_id)
        .bind(&notification.action_url)
        .bind(notification.is_read)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_notification(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, AppError> {
        Ok(sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE tenant_id = $1 AND user_id = $2 AND id = $3 AND deleted_at IS NULL
            "#
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_notifications(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        const WHERE: &str = "tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL \
            AND (NOT $3 OR is_read = false)";
        let (limit, offset) = limit_offset(page);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM notifications WHERE {WHERE}"))
                .bind(tenant_id)
                .bind(user_id)
                .bind(unread_only)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn count_unread(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE tenant_id = $1 AND user_id = $2 AND is_read = false AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn update_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE notifications SET is_read = $3, read_at = $4 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(notification.tenant_id)
        .bind(notification.id)
        .bind(notification.is_read)
        .bind(notification.read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_all_read(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET is_read = true, read_at = NOW()
            WHERE tenant_id = $1 AND user_id = $2 AND is_read = false AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET deleted_at = NOW()
            WHERE tenant_id = $1 AND user_id = $2 AND id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl WebhookRepository for PgStore {
    async fn create_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_endpoints (id, tenant_id, url, secret, events, is_active, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(endpoint.id)
        .bind(endpoint.tenant_id)
        .bind(&endpoint.url)
        .bind(&endpoint.secret)
        .bind(&endpoint.events)
        .bind(endpoint.is_active)
        .bind(endpoint.created_by)
        .bind(endpoint.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_active_endpoints(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<WebhookEndpoint>, AppError> {
        Ok(sqlx::query_as::<_, WebhookEndpoint>(&format!(
            r#"
            SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints
            WHERE tenant_id = $1 AND is_active = true
            ORDER BY created_at
            "#
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn deactivate_endpoint(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_endpoints SET is_active = false
            WHERE tenant_id = $1 AND id = $2 AND is_active = true
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_delivery(&self, delivery: &WebhookDelivery) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (
                id, tenant_id, endpoint_id, event_id, event_type, payload, sent_at,
                response_status, response_body, error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.tenant_id)
        .bind(delivery.endpoint_id)
        .bind(delivery.event_id)
        .bind(&delivery.event_type)
        .bind(&delivery.payload)
        .bind(delivery.sent_at)
        .bind(delivery.response_status)
        .bind(&delivery.response_body)
        .bind(&delivery.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_deliveries(
        &self,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<WebhookDelivery>, AppError> {
        let (limit, offset) = limit_offset(page);
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM webhook_deliveries WHERE tenant_id = $1 AND endpoint_id = $2",
        )
        .bind(tenant_id)
        .bind(endpoint_id)
        .fetch_one(&self.pool)
        .await?;
        let items = sqlx::query_as::<_, WebhookDelivery>(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries
            WHERE tenant_id = $1 AND endpoint_id = $2
            ORDER BY sent_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(tenant_id)
        .bind(endpoint_id)
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
