//! Notifications repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{enums::NotificationTarget, notification::Notification},
};

#[async_trait]
pub trait NotificationsRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> AppResult<()>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Notification>;
    /// Inbox of one addressee, newest first
    async fn list_for(
        &self,
        target: NotificationTarget,
        resource_id: Uuid,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>>;
    async fn count_unread(&self, target: NotificationTarget, resource_id: Uuid) -> AppResult<i64>;
    async fn list_for_rental(&self, rental_id: Uuid) -> AppResult<Vec<Notification>>;
    async fn mark_read(&self, id: Uuid) -> AppResult<Notification>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub(crate) fn notification_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Notification {} not found", id))
}

#[derive(Clone)]
pub struct PgNotificationsRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationsRepository for PgNotificationsRepository {
    async fn insert(&self, n: &Notification) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, rental_id, resource_type, resource_id, reason,
                vehicle_id, driver_id, details, is_read, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(n.id)
        .bind(n.rental_id)
        .bind(n.resource_type)
        .bind(n.resource_id)
        .bind(n.reason)
        .bind(n.vehicle_id)
        .bind(n.driver_id)
        .bind(&n.details)
        .bind(n.is_read)
        .bind(n.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| notification_not_found(id))
    }

    async fn list_for(
        &self,
        target: NotificationTarget,
        resource_id: Uuid,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE resource_type = $1 AND resource_id = $2
              AND ($3 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            "#,
        )
        .bind(target)
        .bind(resource_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_unread(&self, target: NotificationTarget, resource_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE resource_type = $1 AND resource_id = $2 AND is_read = FALSE",
        )
        .bind(target)
        .bind(resource_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_for_rental(&self, rental_id: Uuid) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE rental_id = $1 ORDER BY created_at",
        )
        .bind(rental_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_read(&self, id: Uuid) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| notification_not_found(id))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(notification_not_found(id));
        }
        Ok(())
    }
}
