//! In-process store implementing every repository trait
//!
//! All state sits behind one mutex, so each trait method is atomic with
//! respect to every other one. Used by the test-suite and by the `memory`
//! storage backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    directory::DirectoryRepository,
    notifications::{notification_not_found, NotificationsRepository},
    pricing::{price_not_found, PricingRepository},
    rentals::{booking_conflict, payment_on_closed_rental, rental_not_found, RentalsRepository},
    schedules::SchedulesRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        directory::{Agency, Organization, Vehicle},
        enums::{NotificationTarget, RentalStatus, ResourceType, ScheduleStatus},
        notification::Notification,
        payment::{Payment, SettlementOutcome},
        pricing::Pricing,
        rental::{CancelOutcome, Rental, RentalFilter, ReturnOutcome},
        schedule::ScheduleEntry,
    },
};

#[derive(Default)]
struct MemoryState {
    rentals: HashMap<Uuid, Rental>,
    payments: Vec<Payment>,
    schedules: Vec<ScheduleEntry>,
    notifications: Vec<Notification>,
    pricing: HashMap<(ResourceType, Uuid), Pricing>,
    vehicles: HashMap<Uuid, Vehicle>,
    organizations: HashMap<Uuid, Organization>,
    agencies: HashMap<Uuid, Agency>,
}

impl MemoryState {
    fn rental_mut(&mut self, id: Uuid) -> AppResult<&mut Rental> {
        self.rentals.get_mut(&id).ok_or_else(|| rental_not_found(id))
    }

    fn live_rental_overlapping(
        &self,
        exclude: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        matches: impl Fn(&Rental) -> bool,
    ) -> Option<&Rental> {
        self.rentals.values().find(|r| {
            r.id != exclude && !r.status.is_terminal() && matches(r) && r.overlaps(start, end)
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    // ---- Directory seeding ----

    pub fn put_organization(&self, organization: Organization) -> AppResult<()> {
        self.state()?.organizations.insert(organization.id, organization);
        Ok(())
    }

    pub fn put_agency(&self, agency: Agency) -> AppResult<()> {
        self.state()?.agencies.insert(agency.id, agency);
        Ok(())
    }

    pub fn put_vehicle(&self, vehicle: Vehicle) -> AppResult<()> {
        self.state()?.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn get_vehicle(&self, id: Uuid) -> AppResult<Vehicle> {
        self.state()?
            .vehicles
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", id)))
    }

    async fn get_organization(&self, id: Uuid) -> AppResult<Organization> {
        self.state()?
            .organizations
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", id)))
    }

    async fn get_agency(&self, id: Uuid) -> AppResult<Agency> {
        self.state()?
            .agencies
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Agency {} not found", id)))
    }

    async fn add_monthly_revenue(&self, agency_id: Uuid, amount: Decimal) -> AppResult<()> {
        let mut state = self.state()?;
        let agency = state
            .agencies
            .get_mut(&agency_id)
            .ok_or_else(|| AppError::NotFound(format!("Agency {} not found", agency_id)))?;
        agency.monthly_revenue += amount;
        Ok(())
    }
}

#[async_trait]
impl PricingRepository for MemoryStore {
    async fn get(&self, resource_type: ResourceType, resource_id: Uuid) -> AppResult<Pricing> {
        self.find(resource_type, resource_id)
            .await?
            .ok_or_else(|| price_not_found(resource_type, resource_id))
    }

    async fn find(&self, resource_type: ResourceType, resource_id: Uuid) -> AppResult<Option<Pricing>> {
        Ok(self.state()?.pricing.get(&(resource_type, resource_id)).cloned())
    }

    async fn upsert(&self, pricing: &Pricing) -> AppResult<Pricing> {
        self.state()?
            .pricing
            .insert((pricing.resource_type, pricing.resource_id), pricing.clone());
        Ok(pricing.clone())
    }
}

#[async_trait]
impl SchedulesRepository for MemoryStore {
    async fn insert(&self, entry: &ScheduleEntry) -> AppResult<()> {
        self.state()?.schedules.push(entry.clone());
        Ok(())
    }

    async fn list_future(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleEntry>> {
        let mut rows: Vec<ScheduleEntry> = self
            .state()?
            .schedules
            .iter()
            .filter(|e| e.is_for(resource_type, resource_id) && e.end_date >= now)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.start_date);
        Ok(rows)
    }

    async fn find_conflicts(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleEntry>> {
        let mut rows: Vec<ScheduleEntry> = self
            .state()?
            .schedules
            .iter()
            .filter(|e| e.is_for(resource_type, resource_id) && e.conflicts_with(start, end))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.start_date);
        Ok(rows)
    }

    async fn list_for_rental(&self, rental_id: Uuid) -> AppResult<Vec<ScheduleEntry>> {
        let mut rows: Vec<ScheduleEntry> = self
            .state()?
            .schedules
            .iter()
            .filter(|e| e.rental_id == Some(rental_id))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.start_date);
        Ok(rows)
    }
}

#[async_trait]
impl NotificationsRepository for MemoryStore {
    async fn insert(&self, notification: &Notification) -> AppResult<()> {
        self.state()?.notifications.push(notification.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Notification> {
        self.state()?
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| notification_not_found(id))
    }

    async fn list_for(
        &self,
        target: NotificationTarget,
        resource_id: Uuid,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .state()?
            .notifications
            .iter()
            .filter(|n| n.resource_type == target && n.resource_id == resource_id)
            .filter(|n| !unread_only || !n.is_read)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn count_unread(&self, target: NotificationTarget, resource_id: Uuid) -> AppResult<i64> {
        let count = self
            .state()?
            .notifications
            .iter()
            .filter(|n| n.resource_type == target && n.resource_id == resource_id && !n.is_read)
            .count();
        Ok(count as i64)
    }

    async fn list_for_rental(&self, rental_id: Uuid) -> AppResult<Vec<Notification>> {
        Ok(self
            .state()?
            .notifications
            .iter()
            .filter(|n| n.rental_id == rental_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid) -> AppResult<Notification> {
        let mut state = self.state()?;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| notification_not_found(id))?;
        notification.is_read = true;
        Ok(notification.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state()?;
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != id);
        if state.notifications.len() == before {
            return Err(notification_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl RentalsRepository for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Rental> {
        self.state()?
            .rentals
            .get(&id)
            .cloned()
            .ok_or_else(|| rental_not_found(id))
    }

    async fn list(&self, filter: &RentalFilter) -> AppResult<(Vec<Rental>, i64)> {
        let state = self.state()?;
        let mut rows: Vec<Rental> = state
            .rentals
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert_if_available(&self, rental: &Rental) -> AppResult<()> {
        let mut state = self.state()?;

        for resource_type in [ResourceType::Vehicle, ResourceType::Driver] {
            let resource_id = match resource_type {
                ResourceType::Vehicle => rental.vehicle_id,
                ResourceType::Driver => rental.driver_id,
            };
            let blocked = state.schedules.iter().any(|e| {
                e.is_for(resource_type, resource_id) && e.conflicts_with(rental.start_date, rental.end_date)
            });
            if blocked {
                return Err(booking_conflict(rental, resource_type));
            }
        }

        if let Some(other) = state.live_rental_overlapping(rental.id, rental.start_date, rental.end_date, |r| {
            r.vehicle_id == rental.vehicle_id || r.driver_id == rental.driver_id
        }) {
            let resource_type = if other.vehicle_id == rental.vehicle_id {
                ResourceType::Vehicle
            } else {
                ResourceType::Driver
            };
            return Err(booking_conflict(rental, resource_type));
        }

        state.rentals.insert(rental.id, rental.clone());
        Ok(())
    }

    async fn transition(&self, id: Uuid, from: &[RentalStatus], to: RentalStatus) -> AppResult<Rental> {
        let mut state = self.state()?;
        let rental = state.rental_mut(id)?;
        rental.transition(from, to, Utc::now())?;
        Ok(rental.clone())
    }

    async fn settle_payment(&self, payment: &Payment) -> AppResult<SettlementOutcome> {
        let mut state = self.state()?;
        let mut rental = state.rental_mut(payment.rental_id)?.clone();

        if let Some(ref key) = payment.idempotency_key {
            let seen = state
                .payments
                .iter()
                .any(|p| p.rental_id == payment.rental_id && p.idempotency_key.as_deref() == Some(key.as_str()));
            if seen {
                return Ok(SettlementOutcome {
                    previous_status: rental.status,
                    rental,
                    payment: None,
                    calendar_blocked: false,
                });
            }
        }

        if rental.status.is_terminal() {
            return Err(payment_on_closed_rental(&rental));
        }

        let effect = rental.apply_payment(payment.amount, payment.transaction_date);
        state.payments.push(payment.clone());
        if effect.confirmed {
            state.schedules.extend(rental.rental_blocks(payment.transaction_date));
        }
        state.rentals.insert(rental.id, rental.clone());

        Ok(SettlementOutcome {
            rental,
            payment: Some(payment.clone()),
            previous_status: effect.previous_status,
            calendar_blocked: effect.confirmed,
        })
    }

    async fn complete_return(&self, id: Uuid, maintenance_window: Duration) -> AppResult<ReturnOutcome> {
        let now = Utc::now();
        let mut state = self.state()?;
        let rental = {
            let rental = state.rental_mut(id)?;
            rental.transition(&[RentalStatus::UnderReview], RentalStatus::Completed, now)?;
            rental.clone()
        };

        let (window_start, window_end) = rental.maintenance_window(maintenance_window);
        let maintenance_blocked = state
            .live_rental_overlapping(rental.id, window_start, window_end, |r| r.vehicle_id == rental.vehicle_id)
            .is_none();
        if maintenance_blocked {
            state.schedules.extend(rental.maintenance_blocks(maintenance_window, now));
        }

        Ok(ReturnOutcome { rental, maintenance_blocked })
    }

    async fn cancel(&self, id: Uuid) -> AppResult<CancelOutcome> {
        let mut state = self.state()?;
        let (rental, previous_status) = {
            let rental = state.rental_mut(id)?;
            let previous = rental.transition(&RentalStatus::CANCELLABLE, RentalStatus::Cancelled, Utc::now())?;
            (rental.clone(), previous)
        };

        let before = state.schedules.len();
        state
            .schedules
            .retain(|e| !(e.rental_id == Some(id) && e.status == ScheduleStatus::Rented));
        let released_blocks = (before - state.schedules.len()) as u64;

        Ok(CancelOutcome {
            rental,
            previous_status,
            released_blocks,
        })
    }

    async fn list_payments(&self, rental_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut rows: Vec<Payment> = self
            .state()?
            .payments
            .iter()
            .filter(|p| p.rental_id == rental_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.transaction_date);
        Ok(rows)
    }
}
