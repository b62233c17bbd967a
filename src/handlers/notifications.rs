//! In-app notifications.
//!
//! Every authenticated user can read and manage their own notifications;
//! sending one to another user needs `notifications.messages.send`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::auth::permissions;
use crate::models::notification::{
    CreateNotificationRequest, MarkAllReadResponse, Notification, NotificationFilter, UnreadCount,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::notification_service;

/// Send a notification to a user of the tenant.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "title": "Inventory count",
///   "message": "Zone A count starts Monday",
///   "priority": "HIGH"
/// }
/// ```
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::NOTIFICATIONS_SEND)?;
    let notification =
        notification_service::create_notification(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// The caller's notifications, newest first. `?unread_only=true` hides read ones.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<PaginatedResponse<Notification>>, AppError> {
    let page = PageRequest::from(page);
    let unread_only = filter.unread_only.unwrap_or(false);
    let notifications =
        notification_service::list_own(&state.ctx, &auth, unread_only, page).await?;
    Ok(Json(PaginatedResponse::new(notifications, page)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UnreadCount>, AppError> {
    Ok(Json(
        notification_service::unread_count(&state.ctx, &auth).await?,
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(
        notification_service::mark_read(&state.ctx, &auth, id).await?,
    ))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    Ok(Json(
        notification_service::mark_all_read(&state.ctx, &auth).await?,
    ))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    notification_service::delete_own(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
