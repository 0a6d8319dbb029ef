//! Quote calculator: prices a rental from unit rates, duration and rates

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{enums::RentalType, pricing::Pricing},
};

/// Computed amounts for a prospective rental
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Quote {
    /// Billed days or hours
    pub units: i64,
    pub subtotal: Decimal,
    pub commission: Decimal,
    pub deposit: Decimal,
    pub total: Decimal,
}

/// Whole days (DAILY) or hours (HOURLY) between start and end, floored,
/// never less than one unit.
pub fn billable_units(start: DateTime<Utc>, end: DateTime<Utc>, rental_type: RentalType) -> i64 {
    let elapsed = end - start;
    let units = match rental_type {
        RentalType::Daily => elapsed.num_days(),
        RentalType::Hourly => elapsed.num_hours(),
    };
    units.max(1)
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn quote(
    vehicle_price: &Pricing,
    driver_price: &Pricing,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rental_type: RentalType,
    commission_rate: Decimal,
    deposit_rate: Decimal,
) -> AppResult<Quote> {
    if end <= start {
        return Err(AppError::Validation(format!(
            "End date {} must be after start date {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    if commission_rate.is_sign_negative() || deposit_rate.is_sign_negative() {
        return Err(AppError::Validation("Rates cannot be negative".to_string()));
    }

    let vehicle_unit = vehicle_price.unit_price(rental_type);
    let driver_unit = driver_price.unit_price(rental_type);
    if vehicle_unit.is_sign_negative() || driver_unit.is_sign_negative() {
        return Err(AppError::Validation("Prices cannot be negative".to_string()));
    }

    let units = billable_units(start, end, rental_type);
    let subtotal = money((vehicle_unit + driver_unit) * Decimal::from(units));
    let commission = money(subtotal * commission_rate);
    let deposit = money(subtotal * deposit_rate);

    Ok(Quote {
        units,
        subtotal,
        commission,
        deposit,
        total: subtotal + commission + deposit,
    })
}
