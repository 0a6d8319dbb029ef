//! Availability ledger: calendar blocks on vehicles and drivers

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{ResourceType, ScheduleStatus},
        schedule::{CreateScheduleEntry, ScheduleEntry},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
    grace: Duration,
}

impl AvailabilityService {
    pub fn new(repository: Repository, grace: Duration) -> Self {
        Self { repository, grace }
    }

    /// Block a resource over `[start, end)`.
    ///
    /// Rejects empty or inverted windows and windows starting before
    /// `now - grace`; back-dated blocks are reserved to the rental lifecycle.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_unavailability(
        &self,
        organization_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: ScheduleStatus,
        reason: Option<String>,
    ) -> AppResult<ScheduleEntry> {
        let now = Utc::now();
        if end <= start {
            return Err(AppError::Validation(
                "Schedule end must be after its start".to_string(),
            ));
        }
        if start < now - self.grace {
            return Err(AppError::Validation(format!(
                "Schedule cannot start in the past ({})",
                start.to_rfc3339()
            )));
        }

        let entry = ScheduleEntry {
            id: Uuid::new_v4(),
            organization_id,
            resource_type,
            resource_id,
            start_date: start,
            end_date: end,
            status,
            reason,
            rental_id: None,
            created_at: now,
        };
        self.repository.schedules.insert(&entry).await?;

        tracing::info!(
            resource_type = %resource_type,
            %resource_id,
            status = ?status,
            "Schedule entry added"
        );
        Ok(entry)
    }

    /// Staff-entered block; vehicles must belong to the organization
    pub async fn create(&self, organization_id: Uuid, data: CreateScheduleEntry) -> AppResult<ScheduleEntry> {
        if data.resource_type == ResourceType::Vehicle {
            let vehicle = self.repository.directory.get_vehicle(data.resource_id).await?;
            if vehicle.organization_id != organization_id {
                return Err(AppError::NotFound(format!("Vehicle {} not found", data.resource_id)));
            }
        }
        self.add_unavailability(
            organization_id,
            data.resource_type,
            data.resource_id,
            data.start_date,
            data.end_date,
            data.status,
            data.reason,
        )
        .await
    }

    /// Entries that have not ended yet, ascending by start
    pub async fn future_schedule(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<Vec<ScheduleEntry>> {
        self.repository
            .schedules
            .list_future(resource_type, resource_id, Utc::now())
            .await
    }

    /// Blocking entries strictly overlapping `[start, end)`
    pub async fn conflicts(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleEntry>> {
        if end <= start {
            return Err(AppError::Validation(
                "Conflict window end must be after its start".to_string(),
            ));
        }
        self.repository
            .schedules
            .find_conflicts(resource_type, resource_id, start, end)
            .await
    }

    /// Calendar blocks created by a rental's lifecycle
    pub async fn rental_blocks(&self, rental_id: Uuid) -> AppResult<Vec<ScheduleEntry>> {
        self.repository.schedules.list_for_rental(rental_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryStore;
    use std::sync::Arc;

    fn service() -> AvailabilityService {
        AvailabilityService::new(
            Repository::memory(Arc::new(MemoryStore::new())),
            Duration::minutes(5),
        )
    }

    #[tokio::test]
    async fn test_rejects_invalid_windows() {
        let service = service();
        let now = Utc::now();
        let vehicle = Uuid::new_v4();

        let inverted = service
            .add_unavailability(Uuid::new_v4(), ResourceType::Vehicle, vehicle, now + Duration::hours(2), now + Duration::hours(1), ScheduleStatus::Unavailable, None)
            .await;
        assert!(matches!(inverted, Err(AppError::Validation(_))));

        let backdated = service
            .add_unavailability(Uuid::new_v4(), ResourceType::Vehicle, vehicle, now - Duration::hours(1), now + Duration::hours(1), ScheduleStatus::Unavailable, None)
            .await;
        assert!(matches!(backdated, Err(AppError::Validation(_))));

        // within the grace tolerance
        let recent = service
            .add_unavailability(Uuid::new_v4(), ResourceType::Vehicle, vehicle, now - Duration::minutes(1), now + Duration::hours(1), ScheduleStatus::Unavailable, None)
            .await;
        assert!(recent.is_ok());
    }

    #[tokio::test]
    async fn test_future_schedule_is_ordered() {
        let service = service();
        let org = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let now = Utc::now();

        for offset in [10, 2, 6] {
            service
                .add_unavailability(org, ResourceType::Driver, driver, now + Duration::hours(offset), now + Duration::hours(offset + 1), ScheduleStatus::Unavailable, None)
                .await
                .unwrap();
        }

        let starts: Vec<_> = service
            .future_schedule(ResourceType::Driver, driver)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.start_date)
            .collect();
        assert_eq!(starts.len(), 3);
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));

        assert!(service.future_schedule(ResourceType::Vehicle, driver).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conflicts_use_strict_overlap() {
        let service = service();
        let org = Uuid::new_v4();
        let vehicle = Uuid::new_v4();
        let base = Utc::now() + Duration::days(1);

        service
            .add_unavailability(org, ResourceType::Vehicle, vehicle, base, base + Duration::hours(4), ScheduleStatus::Maintenance, None)
            .await
            .unwrap();
        service
            .add_unavailability(org, ResourceType::Vehicle, vehicle, base, base + Duration::hours(4), ScheduleStatus::Available, None)
            .await
            .unwrap();

        let touching = service
            .conflicts(ResourceType::Vehicle, vehicle, base + Duration::hours(4), base + Duration::hours(6))
            .await
            .unwrap();
        assert!(touching.is_empty());

        let overlapping = service
            .conflicts(ResourceType::Vehicle, vehicle, base + Duration::hours(3), base + Duration::hours(6))
            .await
            .unwrap();
        assert_eq!(overlapping.len(), 1);
        assert_eq!(overlapping[0].status, ScheduleStatus::Maintenance);
    }
}
