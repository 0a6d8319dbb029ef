//! Notification records addressed to a client, driver or agency

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::enums::{NotificationReason, NotificationTarget};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub resource_type: NotificationTarget,
    pub resource_id: Uuid,
    pub reason: NotificationReason,
    pub vehicle_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub details: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification waiting to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub rental_id: Uuid,
    pub resource_type: NotificationTarget,
    pub resource_id: Uuid,
    pub reason: NotificationReason,
    pub vehicle_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub details: String,
}

impl NewNotification {
    pub fn into_notification(self, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            rental_id: self.rental_id,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            reason: self.reason,
            vehicle_id: self.vehicle_id,
            driver_id: self.driver_id,
            details: self.details,
            is_read: false,
            created_at: now,
        }
    }
}

/// Query parameters for the notification inbox
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct NotificationQuery {
    /// Only return unread notifications
    pub unread_only: Option<bool>,
}
