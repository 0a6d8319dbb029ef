//! Availability schedule entries (calendar blocks on vehicles and drivers)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::enums::{ResourceType, ScheduleStatus};
use super::rental::Rental;

/// A time-ranged block on a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub reason: Option<String>,
    /// Set on blocks created by the rental lifecycle
    pub rental_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Strict interval overlap of `[a_start, a_end)` and `[b_start, b_end)`;
/// touching endpoints do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

impl ScheduleEntry {
    pub(crate) fn for_rental(
        rental: &Rental,
        resource_type: ResourceType,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: ScheduleStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let resource_id = match resource_type {
            ResourceType::Vehicle => rental.vehicle_id,
            ResourceType::Driver => rental.driver_id,
        };
        Self {
            id: Uuid::new_v4(),
            organization_id: rental.organization_id,
            resource_type,
            resource_id,
            start_date,
            end_date,
            status,
            reason: Some(reason.to_string()),
            rental_id: Some(rental.id),
            created_at: now,
        }
    }

    /// Whether this entry prevents a booking of `[start, end)`
    pub fn conflicts_with(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.status.is_blocking() && overlaps(start, end, self.start_date, self.end_date)
    }

    pub fn is_for(&self, resource_type: ResourceType, resource_id: Uuid) -> bool {
        self.resource_type == resource_type && self.resource_id == resource_id
    }
}

/// Manual unavailability request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateScheduleEntry {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub reason: Option<String>,
}

/// Window for conflict queries
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ConflictQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    #[test]
    fn test_strict_overlap() {
        // [a,b) vs [c,d) overlaps iff a < d && b > c
        let cases = [
            ((0, 4), (2, 6), true),
            ((2, 6), (0, 4), true),
            ((0, 10), (2, 3), true),
            ((0, 4), (4, 8), false),
            ((4, 8), (0, 4), false),
            ((0, 2), (5, 6), false),
        ];
        for ((a, b), (c, d), expected) in cases {
            assert_eq!(overlaps(at(a), at(b), at(c), at(d)), expected, "[{a},{b}) vs [{c},{d})");
        }
    }

    #[test]
    fn test_available_entries_never_conflict() {
        let entry = ScheduleEntry {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            resource_type: ResourceType::Vehicle,
            resource_id: Uuid::new_v4(),
            start_date: at(0),
            end_date: at(10),
            status: ScheduleStatus::Available,
            reason: None,
            rental_id: None,
            created_at: at(0),
        };
        assert!(!entry.conflicts_with(at(1), at(2)));

        let blocked = ScheduleEntry { status: ScheduleStatus::Unavailable, ..entry };
        assert!(blocked.conflicts_with(at(1), at(2)));
        assert!(!blocked.conflicts_with(at(10), at(12)));
    }
}
