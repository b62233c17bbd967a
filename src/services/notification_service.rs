//! In-app notifications.
//!
//! Users only ever see their own notifications; another user's id behaves
//! like a missing row.

use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::notification::{
    CreateNotificationRequest, MarkAllReadResponse, Notification, UnreadCount,
};
use crate::pagination::{Page, PageRequest};

/// Store a notification for a user of the tenant.
pub async fn deliver(
    ctx: &Context,
    tenant_id: Uuid,
    request: CreateNotificationRequest,
) -> Result<Notification, AppError> {
    let recipient = ctx
        .repos
        .auth
        .find_user(tenant_id, request.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::NotFound("User"))?;

    let notification = Notification::new(tenant_id, request)?;
    ctx.repos
        .notifications
        .insert_notification(&notification)
        .await?;

    tracing::debug!(%tenant_id, user_id = %recipient.id, notification_id = %notification.id, "Notification sent");
    Ok(notification)
}

/// `POST /v1/notifications`: send a notification to a user of the caller's tenant.
pub async fn create_notification(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateNotificationRequest,
) -> Result<Notification, AppError> {
    deliver(ctx, auth.tenant_id, request).await
}

pub async fn list_own(
    ctx: &Context,
    auth: &AuthContext,
    unread_only: bool,
    page: PageRequest,
) -> Result<Page<Notification>, AppError> {
    ctx.repos
        .notifications
        .list_notifications(auth.tenant_id, auth.user_id, unread_only, page)
        .await
}

pub async fn unread_count(ctx: &Context, auth: &AuthContext) -> Result<UnreadCount, AppError> {
    let unread = ctx
        .repos
        .notifications
        .count_unread(auth.tenant_id, auth.user_id)
        .await?;
    Ok(UnreadCount { unread })
}

pub async fn mark_read(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Notification, AppError> {
    let mut notification = ctx
        .repos
        .notifications
        .find_notification(auth.tenant_id, auth.user_id, id)
        .await?
        .ok_or(AppError::NotFound("Notification"))?;

    if !notification.is_read {
        notification.mark_read();
        ctx.repos
            .notifications
            .update_notification(&notification)
            .await?;
    }
    Ok(notification)
}

pub async fn mark_all_read(
    ctx: &Context,
    auth: &AuthContext,
) -> Result<MarkAllReadResponse, AppError> {
    let updated = ctx
        .repos
        .notifications
        .mark_all_read(auth.tenant_id, auth.user_id)
        .await?;
    Ok(MarkAllReadResponse { updated })
}

pub async fn delete_own(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    if ctx
        .repos
        .notifications
        .delete_notification(auth.tenant_id, auth.user_id, id)
        .await?
    {
        Ok(())
    } else {
        Err(AppError::NotFound("Notification"))
    }
}
