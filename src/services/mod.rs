//! Business logic services

pub mod availability;
pub mod notifications;
pub mod payments;
pub mod pricing;
pub mod quote;
pub mod rentals;

use chrono::Duration;

use crate::{config::RentalsConfig, repository::Repository};

use notifications::NotificationDispatcher;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub pricing: pricing::PricingService,
    pub availability: availability::AvailabilityService,
    pub notifications: notifications::NotificationsService,
    pub rentals: rentals::RentalsService,
    pub payments: payments::PaymentsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, rentals_config: RentalsConfig, dispatcher: NotificationDispatcher) -> Self {
        let pricing = pricing::PricingService::new(repository.clone());
        let availability = availability::AvailabilityService::new(
            repository.clone(),
            Duration::seconds(rentals_config.schedule_grace_seconds),
        );
        let notifications = notifications::NotificationsService::new(repository.clone(), dispatcher);
        let rentals = rentals::RentalsService::new(
            repository.clone(),
            pricing.clone(),
            notifications.clone(),
            rentals_config,
        );
        let payments = payments::PaymentsService::new(repository, rentals.clone(), notifications.clone());

        Self {
            pricing,
            availability,
            notifications,
            rentals,
            payments,
        }
    }
}
