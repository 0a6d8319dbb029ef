//! Per-resource pricing

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::enums::{RentalType, ResourceType};

/// Active price of a vehicle or driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Pricing {
    pub organization_id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub price_per_hour: Decimal,
    pub price_per_day: Decimal,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl Pricing {
    /// Rate billed per unit of the given rental type
    pub fn unit_price(&self, rental_type: RentalType) -> Decimal {
        match rental_type {
            RentalType::Daily => self.price_per_day,
            RentalType::Hourly => self.price_per_hour,
        }
    }
}

/// Set price request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetPricing {
    pub price_per_hour: Decimal,
    pub price_per_day: Decimal,
    /// ISO 4217 code, defaults to the previous value or "XOF"
    pub currency: Option<String>,
}
