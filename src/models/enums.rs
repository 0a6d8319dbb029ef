//! Shared domain enums
//!
//! Each enum maps to a PostgreSQL enum type of the same snake_case name
//! (see `migrations/`) and serializes as SCREAMING_SNAKE_CASE on the wire.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// RentalStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a rental
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "rental_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalStatus {
    Pending,
    Reserved,
    Paid,
    Ongoing,
    UnderReview,
    Completed,
    Cancelled,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Pending => "PENDING",
            RentalStatus::Reserved => "RESERVED",
            RentalStatus::Paid => "PAID",
            RentalStatus::Ongoing => "ONGOING",
            RentalStatus::UnderReview => "UNDER_REVIEW",
            RentalStatus::Completed => "COMPLETED",
            RentalStatus::Cancelled => "CANCELLED",
        }
    }

    /// Completed and cancelled rentals never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RentalStatus::Completed | RentalStatus::Cancelled)
    }

    /// Statuses from which a rental may still be cancelled
    pub const CANCELLABLE: [RentalStatus; 3] = [
        RentalStatus::Pending,
        RentalStatus::Reserved,
        RentalStatus::Paid,
    ];

    /// Statuses in which the vehicle and driver calendars hold a RENTED block
    pub fn holds_calendar(&self) -> bool {
        matches!(
            self,
            RentalStatus::Reserved | RentalStatus::Paid | RentalStatus::Ongoing | RentalStatus::UnderReview
        )
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RentalType
// ---------------------------------------------------------------------------

/// Billing granularity of a rental
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "rental_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalType {
    Daily,
    Hourly,
}

// ---------------------------------------------------------------------------
// ResourceType
// ---------------------------------------------------------------------------

/// Kind of schedulable, priced resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "resource_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    #[serde(alias = "vehicle")]
    Vehicle,
    #[serde(alias = "driver")]
    Driver,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Vehicle => f.write_str("VEHICLE"),
            ResourceType::Driver => f.write_str("DRIVER"),
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleStatus
// ---------------------------------------------------------------------------

/// Label of a schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "schedule_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Rented,
    Maintenance,
    Unavailable,
    /// Informational only, never blocks a booking
    Available,
}

impl ScheduleStatus {
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            ScheduleStatus::Rented | ScheduleStatus::Maintenance | ScheduleStatus::Unavailable
        )
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Party a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "notification_target", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationTarget {
    Client,
    Driver,
    Agency,
}

/// Rental event that produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "notification_reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationReason {
    Reservation,
    PaymentReceived,
    LocationStart,
    LocationEndSignal,
    LocationEnd,
    LocationCancelled,
}

// ---------------------------------------------------------------------------
// PaymentMethod
// ---------------------------------------------------------------------------

/// Settlement channel declared by the payer (simulated, no gateway)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    BankTransfer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&RentalStatus::UnderReview).unwrap();
        assert_eq!(json, "\"UNDER_REVIEW\"");
        assert_eq!(RentalStatus::UnderReview.to_string(), "UNDER_REVIEW");
    }

    #[test]
    fn test_resource_type_accepts_lowercase() {
        let rt: ResourceType = serde_json::from_str("\"vehicle\"").unwrap();
        assert_eq!(rt, ResourceType::Vehicle);
    }

    #[test]
    fn test_blocking_statuses() {
        assert!(ScheduleStatus::Rented.is_blocking());
        assert!(ScheduleStatus::Maintenance.is_blocking());
        assert!(ScheduleStatus::Unavailable.is_blocking());
        assert!(!ScheduleStatus::Available.is_blocking());
    }
}
