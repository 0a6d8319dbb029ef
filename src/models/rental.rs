//! Rental model, lifecycle rules and related request types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::{RentalStatus, RentalType, ResourceType, ScheduleStatus};
use super::schedule::ScheduleEntry;
use crate::error::{AppError, AppResult};

/// Share of the total that must be paid for a rental to become RESERVED (60%)
pub const RESERVATION_THRESHOLD: Decimal = Decimal::from_parts(6, 0, 0, false, 1);

/// Rental record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Rental {
    pub id: Uuid,
    /// None for walk-in customers
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub organization_id: Uuid,
    pub agency_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub rental_type: RentalType,
    pub status: RentalStatus,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub commission_amount: Decimal,
    pub deposit_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Effect of a payment on a rental
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentEffect {
    pub previous_status: RentalStatus,
    /// True when this payment moved the rental out of PENDING
    pub confirmed: bool,
}

/// Threshold status rule: 100% of the total makes a rental PAID, 60% makes it
/// RESERVED. Only PENDING and RESERVED rentals move through payment.
pub fn status_after_payment(current: RentalStatus, amount_paid: Decimal, total: Decimal) -> RentalStatus {
    match current {
        RentalStatus::Pending | RentalStatus::Reserved => {
            if amount_paid >= total {
                RentalStatus::Paid
            } else if amount_paid >= total * RESERVATION_THRESHOLD {
                RentalStatus::Reserved
            } else {
                current
            }
        }
        other => other,
    }
}

impl Rental {
    /// Fail with InvalidState unless the rental is in one of `allowed`
    pub fn ensure_status(&self, allowed: &[RentalStatus]) -> AppResult<()> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        let expected = allowed
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        Err(AppError::InvalidState(format!(
            "Rental {} is {}, expected {}",
            self.id, self.status, expected
        )))
    }

    /// Add a payment to the cumulative amount and derive the new status
    pub fn apply_payment(&mut self, amount: Decimal, now: DateTime<Utc>) -> PaymentEffect {
        let previous_status = self.status;
        self.amount_paid += amount;
        self.status = status_after_payment(previous_status, self.amount_paid, self.total_amount);
        self.updated_at = now;

        PaymentEffect {
            previous_status,
            confirmed: previous_status == RentalStatus::Pending && self.status != RentalStatus::Pending,
        }
    }

    /// Move to `to` if the current status is one of `from`
    pub fn transition(&mut self, from: &[RentalStatus], to: RentalStatus, now: DateTime<Utc>) -> AppResult<RentalStatus> {
        self.ensure_status(from)?;
        let previous = self.status;
        self.status = to;
        self.updated_at = now;
        Ok(previous)
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        super::schedule::overlaps(self.start_date, self.end_date, start, end)
    }

    /// RENTED blocks for vehicle and driver over the rental window
    pub fn rental_blocks(&self, now: DateTime<Utc>) -> [ScheduleEntry; 2] {
        let reason = format!("Rental {}", self.id);
        [
            ScheduleEntry::for_rental(self, ResourceType::Vehicle, self.start_date, self.end_date, ScheduleStatus::Rented, &reason, now),
            ScheduleEntry::for_rental(self, ResourceType::Driver, self.start_date, self.end_date, ScheduleStatus::Rented, &reason, now),
        ]
    }

    /// Post-rental maintenance window `[end, end + window)`
    pub fn maintenance_window(&self, window: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.end_date, self.end_date + window)
    }

    /// MAINTENANCE blocks for vehicle and driver following the rental
    pub fn maintenance_blocks(&self, window: Duration, now: DateTime<Utc>) -> [ScheduleEntry; 2] {
        let (start, end) = self.maintenance_window(window);
        let reason = format!("Maintenance after rental {}", self.id);
        [
            ScheduleEntry::for_rental(self, ResourceType::Vehicle, start, end, ScheduleStatus::Maintenance, &reason, now),
            ScheduleEntry::for_rental(self, ResourceType::Driver, start, end, ScheduleStatus::Maintenance, &reason, now),
        ]
    }

    pub fn balance_due(&self) -> Decimal {
        (self.total_amount - self.amount_paid).max(Decimal::ZERO)
    }
}

/// Outcome of a validated return
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub rental: Rental,
    /// False when another rental already occupies the maintenance window
    pub maintenance_blocked: bool,
}

/// Outcome of a cancellation
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub rental: Rental,
    pub previous_status: RentalStatus,
    /// Number of RENTED calendar blocks removed
    pub released_blocks: u64,
}

/// Client-originated rental request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct InitiateRental {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub rental_type: RentalType,
    #[validate(length(min = 6, max = 32, message = "Invalid phone number"))]
    pub client_phone: String,
    #[validate(length(min = 1, max = 128))]
    pub client_name: Option<String>,
}

/// Agency-originated rental for a customer without an account
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct WalkInRental {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub rental_type: RentalType,
    #[validate(length(min = 1, max = 128, message = "Client name is required"))]
    pub client_name: String,
    #[validate(length(min = 6, max = 32, message = "Invalid phone number"))]
    pub client_phone: String,
}

/// Quote preview request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuoteRequest {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub rental_type: RentalType,
}

/// Amounts returned once a rental has been created
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RentalInitResponse {
    pub rental_id: Uuid,
    pub status: RentalStatus,
    pub units: i64,
    pub subtotal: Decimal,
    pub commission: Decimal,
    pub deposit: Decimal,
    pub total: Decimal,
}

/// Non-persisted answer when the organization does not take driver-inclusive bookings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DriverBookingRefusal {
    pub message: String,
    pub agency_name: String,
    pub agency_phone: Option<String>,
    pub agency_email: Option<String>,
    pub organization_email: Option<String>,
}

/// Result of a client initiation
#[derive(Debug, Clone)]
pub enum InitiationOutcome {
    Created(RentalInitResponse),
    Refused(DriverBookingRefusal),
}

/// Query parameters for rental listings
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct RentalQuery {
    /// Filter by status
    pub status: Option<RentalStatus>,
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page
    pub per_page: Option<i64>,
}

/// Storage-level filter built from the caller identity and a RentalQuery
#[derive(Debug, Clone, Default)]
pub struct RentalFilter {
    pub agency_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub status: Option<RentalStatus>,
    pub page: i64,
    pub per_page: i64,
}

impl RentalFilter {
    pub fn from_query(query: &RentalQuery) -> Self {
        Self {
            agency_id: None,
            client_id: None,
            status: query.status,
            page: query.page.unwrap_or(1).max(1),
            per_page: query.per_page.unwrap_or(50).clamp(1, 200),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn matches(&self, rental: &Rental) -> bool {
        self.agency_id.map_or(true, |id| rental.agency_id == id)
            && self.client_id.map_or(true, |id| rental.client_id == Some(id))
            && self.status.map_or(true, |s| rental.status == s)
    }
}
