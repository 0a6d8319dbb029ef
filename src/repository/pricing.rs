//! Pricing repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{enums::ResourceType, pricing::Pricing},
};

#[async_trait]
pub trait PricingRepository: Send + Sync {
    async fn get(&self, resource_type: ResourceType, resource_id: Uuid) -> AppResult<Pricing>;
    async fn find(&self, resource_type: ResourceType, resource_id: Uuid) -> AppResult<Option<Pricing>>;
    /// Create the record on first write, update it in place afterwards
    async fn upsert(&self, pricing: &Pricing) -> AppResult<Pricing>;
}

pub(crate) fn price_not_found(resource_type: ResourceType, resource_id: Uuid) -> AppError {
    AppError::NotFound(format!("No price set for {} {}", resource_type, resource_id))
}

#[derive(Clone)]
pub struct PgPricingRepository {
    pool: Pool<Postgres>,
}

impl PgPricingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingRepository for PgPricingRepository {
    async fn get(&self, resource_type: ResourceType, resource_id: Uuid) -> AppResult<Pricing> {
        self.find(resource_type, resource_id)
            .await?
            .ok_or_else(|| price_not_found(resource_type, resource_id))
    }

    async fn find(&self, resource_type: ResourceType, resource_id: Uuid) -> AppResult<Option<Pricing>> {
        let row = sqlx::query_as::<_, Pricing>(
            "SELECT * FROM pricing WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(resource_type)
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert(&self, pricing: &Pricing) -> AppResult<Pricing> {
        let row = sqlx::query_as::<_, Pricing>(
            r#"
            INSERT INTO pricing (
                organization_id, resource_type, resource_id,
                price_per_hour, price_per_day, currency, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (resource_type, resource_id) DO UPDATE SET
                price_per_hour = EXCLUDED.price_per_hour,
                price_per_day = EXCLUDED.price_per_day,
                currency = EXCLUDED.currency,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(pricing.organization_id)
        .bind(pricing.resource_type)
        .bind(pricing.resource_id)
        .bind(pricing.price_per_hour)
        .bind(pricing.price_per_day)
        .bind(&pricing.currency)
        .bind(pricing.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
