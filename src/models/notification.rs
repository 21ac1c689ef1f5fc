//! Modelo de Notification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    LowStock,
    NewFineRegistered,
    FreightAssigned,
    FreightUpdated,
    JourneyStarted,
    JourneyEnded,
}

/// Evento a emitir; el emisor lo persiste en segundo plano
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub notification_type: NotificationType,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<Uuid>,
    pub related_vehicle_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(
        organization_id: Uuid,
        user_id: Uuid,
        notification_type: NotificationType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            user_id,
            message: message.into(),
            notification_type,
            related_entity_type: None,
            related_entity_id: None,
            related_vehicle_id: None,
        }
    }

    pub fn about(mut self, entity_type: &str, entity_id: Uuid) -> Self {
        self.related_entity_type = Some(entity_type.to_string());
        self.related_entity_id = Some(entity_id);
        self
    }

    pub fn for_vehicle(mut self, vehicle_id: Option<Uuid>) -> Self {
        self.related_vehicle_id = vehicle_id;
        self
    }
}

/// Notification - mapea a la tabla notifications
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub notification_type: NotificationType,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<Uuid>,
    pub related_vehicle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_new(new: NewNotification, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            user_id: new.user_id,
            message: new.message,
            is_read: false,
            notification_type: new.notification_type,
            related_entity_type: new.related_entity_type,
            related_entity_id: new.related_entity_id,
            related_vehicle_id: new.related_vehicle_id,
            created_at: now,
        }
    }
}
