//! Directory lookups (vehicles, organizations, agencies)

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::directory::{Agency, Organization, Vehicle},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn get_vehicle(&self, id: Uuid) -> AppResult<Vehicle>;
    async fn get_organization(&self, id: Uuid) -> AppResult<Organization>;
    async fn get_agency(&self, id: Uuid) -> AppResult<Agency>;
    /// Atomically add `amount` to the agency's monthly revenue counter
    async fn add_monthly_revenue(&self, agency_id: Uuid, amount: Decimal) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgDirectoryRepository {
    pool: Pool<Postgres>,
}

impl PgDirectoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    async fn get_vehicle(&self, id: Uuid) -> AppResult<Vehicle> {
        sqlx::query_as::<_, Vehicle>("SELECT id, organization_id, agency_id FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", id)))
    }

    async fn get_organization(&self, id: Uuid) -> AppResult<Organization> {
        sqlx::query_as::<_, Organization>(
            "SELECT id, name, requires_driver_booking, email FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", id)))
    }

    async fn get_agency(&self, id: Uuid) -> AppResult<Agency> {
        sqlx::query_as::<_, Agency>(
            r#"
            SELECT id, organization_id, name, email, phone, deposit_percentage, monthly_revenue
            FROM agencies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Agency {} not found", id)))
    }

    async fn add_monthly_revenue(&self, agency_id: Uuid, amount: Decimal) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE agencies SET monthly_revenue = monthly_revenue + $1 WHERE id = $2",
        )
        .bind(amount)
        .bind(agency_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Agency {} not found", agency_id)));
        }
        Ok(())
    }
}
