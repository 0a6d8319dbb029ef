//! Schedule entries repository (availability ledger storage)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{enums::ResourceType, schedule::ScheduleEntry},
};

#[async_trait]
pub trait SchedulesRepository: Send + Sync {
    async fn insert(&self, entry: &ScheduleEntry) -> AppResult<()>;
    /// Entries of a resource ending at or after `now`, ascending by start
    async fn list_future(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleEntry>>;
    /// Blocking entries of a resource strictly overlapping `[start, end)`
    async fn find_conflicts(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleEntry>>;
    async fn list_for_rental(&self, rental_id: Uuid) -> AppResult<Vec<ScheduleEntry>>;
}

/// Insert an entry through any executor, so rental transactions can reuse it
pub(crate) async fn insert_entry<'e, E>(executor: E, entry: &ScheduleEntry) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO schedule_entries (
            id, organization_id, resource_type, resource_id,
            start_date, end_date, status, reason, rental_id, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(entry.id)
    .bind(entry.organization_id)
    .bind(entry.resource_type)
    .bind(entry.resource_id)
    .bind(entry.start_date)
    .bind(entry.end_date)
    .bind(entry.status)
    .bind(&entry.reason)
    .bind(entry.rental_id)
    .bind(entry.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgSchedulesRepository {
    pool: Pool<Postgres>,
}

impl PgSchedulesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchedulesRepository for PgSchedulesRepository {
    async fn insert(&self, entry: &ScheduleEntry) -> AppResult<()> {
        insert_entry(&self.pool, entry).await?;
        Ok(())
    }

    async fn list_future(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleEntry>> {
        let rows = sqlx::query_as::<_, ScheduleEntry>(
            r#"
            SELECT * FROM schedule_entries
            WHERE resource_type = $1 AND resource_id = $2 AND end_date >= $3
            ORDER BY start_date
            "#,
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_conflicts(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleEntry>> {
        let rows = sqlx::query_as::<_, ScheduleEntry>(
            r#"
            SELECT * FROM schedule_entries
            WHERE resource_type = $1 AND resource_id = $2
              AND status IN ('RENTED', 'MAINTENANCE', 'UNAVAILABLE')
              AND start_date < $4 AND end_date > $3
            ORDER BY start_date
            "#,
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_for_rental(&self, rental_id: Uuid) -> AppResult<Vec<ScheduleEntry>> {
        let rows = sqlx::query_as::<_, ScheduleEntry>(
            "SELECT * FROM schedule_entries WHERE rental_id = $1 ORDER BY start_date, resource_type",
        )
        .bind(rental_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
