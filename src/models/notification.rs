//! In-app notifications addressed to a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

string_enum! {
    pub enum NotificationType {
        Info => "INFO",
        Success => "SUCCESS",
        Warning => "WARNING",
        Error => "ERROR",
    }
}

string_enum! {
    pub enum NotificationPriority {
        Low => "LOW",
        Normal => "NORMAL",
        High => "HIGH",
        Urgent => "URGENT",
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub action_url: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

tenant_record!(Notification);

impl Notification {
    pub fn new(tenant_id: Uuid, request: CreateNotificationRequest) -> Result<Self, AppError> {
        if request.title.trim().is_empty() || request.message.trim().is_empty() {
            return Err(AppError::bad_request("Title and message are required"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: request.user_id,
            title: request.title,
            message: request.message,
            notification_type: request.notification_type.unwrap_or(NotificationType::Info),
            priority: request.priority.unwrap_or(NotificationPriority::Normal),
            entity_type: request.entity_type,
            entity_id: request.entity_id,
            action_url: request.action_url,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
            deleted_at: None,
        })
    }

    /// Idempotent.
    pub fn mark_read(&mut self) {
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(Utc::now());
        }
    }
}

/// Request body for sending a notification.
///
/// # JSON Example
///
/// ```json
/// {
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "title": "Inventory count",
///   "message": "Zone A count starts Monday",
///   "priority": "HIGH"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub action_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    pub unread_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateNotificationRequest {
        CreateNotificationRequest {
            user_id: Uuid::new_v4(),
            title: "Payroll approved".into(),
            message: "02/2024 is ready to pay".into(),
            notification_type: None,
            priority: None,
            entity_type: Some("payroll".into()),
            entity_id: Some(Uuid::new_v4()),
            action_url: None,
        }
    }

    #[test]
    fn defaults() {
        let n = Notification::new(Uuid::nil(), request()).unwrap();
        assert_eq!(n.notification_type, NotificationType::Info);
        assert_eq!(n.priority, NotificationPriority::Normal);
        assert!(!n.is_read);
    }

    #[test]
    fn requires_title_and_message() {
        let mut r = request();
        r.title = " ".into();
        assert!(Notification::new(Uuid::nil(), r).is_err());
    }

    #[test]
    fn mark_read_keeps_first_timestamp() {
        let mut n = Notification::new(Uuid::nil(), request()).unwrap();
        n.mark_read();
        let first = n.read_at;
        n.mark_read();
        assert_eq!(n.read_at, first);
    }
}
