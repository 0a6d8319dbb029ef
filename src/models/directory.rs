//! Records owned by the organization directory (vehicles, organizations, agencies)
//!
//! These are read-only for the rental engine except for the agency revenue counter.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Vehicle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub agency_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// Whether clients may book vehicles together with a driver
    pub requires_driver_booking: bool,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Agency {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Deposit share in percent (30 means 30%)
    pub deposit_percentage: Decimal,
    pub monthly_revenue: Decimal,
}

impl Agency {
    /// Deposit share as a fraction of the subtotal
    pub fn deposit_rate(&self) -> Decimal {
        self.deposit_percentage / Decimal::ONE_HUNDRED
    }
}
