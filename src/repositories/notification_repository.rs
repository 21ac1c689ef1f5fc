use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{NotificationRepository, Page};
use crate::models::notification::{NewNotification, Notification};
use crate::utils::errors::{not_found_error, AppResult};

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        let n = Notification::from_new(new, Utc::now());

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, organization_id, user_id, message, is_read, notification_type,
                                       related_entity_type, related_entity_id, related_vehicle_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(n.id)
        .bind(n.organization_id)
        .bind(n.user_id)
        .bind(&n.message)
        .bind(n.is_read)
        .bind(n.notification_type)
        .bind(&n.related_entity_type)
        .bind(n.related_entity_id)
        .bind(n.related_vehicle_id)
        .bind(n.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        page: Page,
    ) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND organization_id = $2
            ORDER BY created_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn unread_count(&self, user_id: Uuid, organization_id: Uuid) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND organization_id = $2 AND NOT is_read",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_as_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND user_id = $2 AND organization_id = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found_error("Notification", id))
    }
}
