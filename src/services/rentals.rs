//! Rental state machine
//!
//! PENDING -> RESERVED -> PAID moves through payments (see the payments
//! service); the remaining transitions are driven from here:
//!
//! - start: PAID -> ONGOING (agency)
//! - signal end: ONGOING -> UNDER_REVIEW (client)
//! - validate return: UNDER_REVIEW -> COMPLETED (agency), plus maintenance block
//! - cancel: PENDING | RESERVED | PAID -> CANCELLED, releasing calendar blocks

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::RentalsConfig,
    error::{AppError, AppResult},
    models::{
        directory::Vehicle,
        enums::{NotificationReason, RentalStatus, RentalType, ResourceType},
        payment::Payment,
        rental::{
            DriverBookingRefusal, InitiateRental, InitiationOutcome, QuoteRequest, Rental, RentalFilter,
            RentalInitResponse, RentalQuery, WalkInRental,
        },
        user::{Actor, Role, UserClaims},
    },
    repository::{rentals::rental_not_found, Repository},
    services::{
        notifications::{FanoutMessages, NotificationsService},
        pricing::PricingService,
        quote::{quote, Quote},
    },
};

/// Who the new rental is for
struct Customer {
    client_id: Option<Uuid>,
    name: Option<String>,
    phone: String,
}

#[derive(Clone)]
pub struct RentalsService {
    repository: Repository,
    pricing: PricingService,
    notifications: NotificationsService,
    config: RentalsConfig,
}

impl RentalsService {
    pub fn new(
        repository: Repository,
        pricing: PricingService,
        notifications: NotificationsService,
        config: RentalsConfig,
    ) -> Self {
        Self {
            repository,
            pricing,
            notifications,
            config,
        }
    }

    async fn price_window(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rental_type: RentalType,
        deposit_rate: Decimal,
    ) -> AppResult<Quote> {
        let vehicle_price = self.pricing.get_price(ResourceType::Vehicle, vehicle_id).await?;
        let driver_price = self.pricing.get_price(ResourceType::Driver, driver_id).await?;
        quote(
            &vehicle_price,
            &driver_price,
            start,
            end,
            rental_type,
            self.config.commission_rate,
            deposit_rate,
        )
    }

    /// Price a prospective rental without persisting anything
    pub async fn quote_preview(&self, request: &QuoteRequest) -> AppResult<Quote> {
        let vehicle = self.repository.directory.get_vehicle(request.vehicle_id).await?;
        let agency = self.repository.directory.get_agency(vehicle.agency_id).await?;
        self.price_window(
            request.vehicle_id,
            request.driver_id,
            request.start_date,
            request.end_date,
            request.rental_type,
            agency.deposit_rate(),
        )
        .await
    }

    /// Create a PENDING rental for a client account.
    ///
    /// Organizations that do not take driver-inclusive bookings get a
    /// refusal carrying the agency contact details; nothing is stored.
    pub async fn initiate_client(&self, client_id: Uuid, request: InitiateRental) -> AppResult<InitiationOutcome> {
        request.validate()?;

        let vehicle = self.repository.directory.get_vehicle(request.vehicle_id).await?;
        let organization = self.repository.directory.get_organization(vehicle.organization_id).await?;
        let agency = self.repository.directory.get_agency(vehicle.agency_id).await?;

        if !organization.requires_driver_booking {
            tracing::info!(
                vehicle_id = %vehicle.id,
                organization_id = %organization.id,
                "Driver-inclusive booking refused by organization policy"
            );
            return Ok(InitiationOutcome::Refused(DriverBookingRefusal {
                message: format!(
                    "{} does not accept online bookings with a driver, please contact the agency directly",
                    organization.name
                ),
                agency_name: agency.name,
                agency_phone: agency.phone,
                agency_email: agency.email,
                organization_email: organization.email,
            }));
        }

        let quote = self
            .price_window(
                request.vehicle_id,
                request.driver_id,
                request.start_date,
                request.end_date,
                request.rental_type,
                agency.deposit_rate(),
            )
            .await?;

        let customer = Customer {
            client_id: Some(client_id),
            name: request.client_name,
            phone: request.client_phone,
        };
        let rental = pending_rental(
            &vehicle,
            request.driver_id,
            request.start_date,
            request.end_date,
            request.rental_type,
            &quote,
            customer,
        );
        self.create(rental, quote).await.map(InitiationOutcome::Created)
    }

    /// Create a PENDING rental for a customer without an account
    pub async fn initiate_walk_in(&self, agency_id: Uuid, request: WalkInRental) -> AppResult<RentalInitResponse> {
        request.validate()?;

        let vehicle = self.repository.directory.get_vehicle(request.vehicle_id).await?;
        if vehicle.agency_id != agency_id {
            return Err(AppError::NotFound(format!(
                "Vehicle {} not found in agency {}",
                vehicle.id, agency_id
            )));
        }

        let quote = self
            .price_window(
                request.vehicle_id,
                request.driver_id,
                request.start_date,
                request.end_date,
                request.rental_type,
                self.config.walk_in_deposit_rate,
            )
            .await?;

        let customer = Customer {
            client_id: None,
            name: Some(request.client_name),
            phone: request.client_phone,
        };
        let rental = pending_rental(
            &vehicle,
            request.driver_id,
            request.start_date,
            request.end_date,
            request.rental_type,
            &quote,
            customer,
        );
        self.create(rental, quote).await
    }

    async fn create(&self, rental: Rental, quote: Quote) -> AppResult<RentalInitResponse> {
        self.repository.rentals.insert_if_available(&rental).await?;

        tracing::info!(
            rental_id = %rental.id,
            vehicle_id = %rental.vehicle_id,
            driver_id = %rental.driver_id,
            total = %rental.total_amount,
            walk_in = rental.client_id.is_none(),
            "Rental initiated"
        );

        let messages = FanoutMessages {
            client: Some(format!(
                "Your reservation {} is registered. Total {}, deposit {}.",
                rental.id, quote.total, quote.deposit
            )),
            agency: format!(
                "New reservation {} for vehicle {} from {} to {}, total {}",
                rental.id,
                rental.vehicle_id,
                rental.start_date.to_rfc3339(),
                rental.end_date.to_rfc3339(),
                quote.total
            ),
            driver: None,
        };
        self.notifications
            .broadcast(&rental, NotificationReason::Reservation, messages)
            .await;

        Ok(RentalInitResponse {
            rental_id: rental.id,
            status: rental.status,
            units: quote.units,
            subtotal: quote.subtotal,
            commission: quote.commission,
            deposit: quote.deposit,
            total: quote.total,
        })
    }

    /// Rental visible to the caller; `NotFound` for anyone else
    pub async fn get(&self, id: Uuid, caller: &UserClaims) -> AppResult<Rental> {
        let rental = self.repository.rentals.get_by_id(id).await?;
        if !caller.can_access_rental(&rental) {
            return Err(rental_not_found(id));
        }
        Ok(rental)
    }

    /// Load a rental the actor owns
    pub async fn owned(&self, id: Uuid, actor: Actor) -> AppResult<Rental> {
        let rental = self.repository.rentals.get_by_id(id).await?;
        if !actor.owns(&rental) {
            return Err(rental_not_found(id));
        }
        Ok(rental)
    }

    /// Rentals of the caller's agency (staff) or of the caller (client)
    pub async fn list(&self, caller: &UserClaims, query: &RentalQuery) -> AppResult<(Vec<Rental>, i64)> {
        let mut filter = RentalFilter::from_query(query);
        match caller.role {
            Role::Client => filter.client_id = Some(caller.user_id),
            Role::AgencyStaff | Role::Admin => filter.agency_id = Some(caller.require_agency_staff()?),
            Role::Driver => {
                return Err(AppError::Authorization(
                    "Drivers cannot list rentals".to_string(),
                ))
            }
        }
        self.repository.rentals.list(&filter).await
    }

    pub async fn payments(&self, id: Uuid, caller: &UserClaims) -> AppResult<Vec<Payment>> {
        self.get(id, caller).await?;
        self.repository.rentals.list_payments(id).await
    }

    /// PAID -> ONGOING
    pub async fn start(&self, id: Uuid, agency_id: Uuid) -> AppResult<Rental> {
        self.owned(id, Actor::Agency(agency_id)).await?;
        let rental = self
            .repository
            .rentals
            .transition(id, &[RentalStatus::Paid], RentalStatus::Ongoing)
            .await?;

        tracing::info!(rental_id = %rental.id, status = %rental.status, "Rental started");

        let messages = FanoutMessages {
            client: Some(format!("Rental {} has started. Drive safely!", rental.id)),
            agency: format!("Vehicle {} is out for rental {}", rental.vehicle_id, rental.id),
            driver: Some(format!("Your trip for rental {} begins now", rental.id)),
        };
        self.notifications
            .broadcast(&rental, NotificationReason::LocationStart, messages)
            .await;
        Ok(rental)
    }

    /// ONGOING -> UNDER_REVIEW, signalled by the client, or by the agency for walk-ins
    pub async fn signal_end(&self, id: Uuid, actor: Actor) -> AppResult<Rental> {
        let current = self.owned(id, actor).await?;
        if matches!(actor, Actor::Agency(_)) && current.client_id.is_some() {
            return Err(AppError::Authorization(format!(
                "Rental {} has a client account, only the client can signal its end",
                id
            )));
        }
        let rental = self
            .repository
            .rentals
            .transition(id, &[RentalStatus::Ongoing], RentalStatus::UnderReview)
            .await?;

        tracing::info!(rental_id = %rental.id, status = %rental.status, "Rental end signalled");

        let messages = FanoutMessages {
            client: Some(format!(
                "End of rental {} signalled, the agency will review the return",
                rental.id
            )),
            agency: format!(
                "End of rental {} signalled, vehicle {} awaits inspection",
                rental.id, rental.vehicle_id
            ),
            driver: Some(format!("Rental {} is ending, please bring the vehicle back", rental.id)),
        };
        self.notifications
            .broadcast(&rental, NotificationReason::LocationEndSignal, messages)
            .await;
        Ok(rental)
    }

    /// UNDER_REVIEW -> COMPLETED, then block the maintenance window
    pub async fn validate_return(&self, id: Uuid, agency_id: Uuid) -> AppResult<Rental> {
        self.owned(id, Actor::Agency(agency_id)).await?;
        let window = Duration::hours(self.config.maintenance_window_hours);
        let outcome = self.repository.rentals.complete_return(id, window).await?;
        let rental = outcome.rental;

        tracing::info!(
            rental_id = %rental.id,
            status = %rental.status,
            maintenance_blocked = outcome.maintenance_blocked,
            "Rental return validated"
        );

        let messages = FanoutMessages {
            client: Some(format!("Rental {} is complete. Thank you!", rental.id)),
            agency: format!("Return of rental {} validated", rental.id),
            driver: Some(format!("Rental {} is complete", rental.id)),
        };
        self.notifications
            .broadcast(&rental, NotificationReason::LocationEnd, messages)
            .await;
        Ok(rental)
    }

    /// PENDING | RESERVED | PAID -> CANCELLED, releasing calendar blocks
    pub async fn cancel(&self, id: Uuid, actor: Actor) -> AppResult<Rental> {
        self.owned(id, actor).await?;
        let outcome = self.repository.rentals.cancel(id).await?;
        let rental = outcome.rental;

        tracing::info!(
            rental_id = %rental.id,
            previous_status = %outcome.previous_status,
            released_blocks = outcome.released_blocks,
            "Rental cancelled"
        );

        let driver = outcome
            .previous_status
            .holds_calendar()
            .then(|| format!("Rental {} was cancelled, your schedule is free again", rental.id));
        let messages = FanoutMessages {
            client: Some(format!("Rental {} has been cancelled", rental.id)),
            agency: format!(
                "Rental {} cancelled ({} paid so far)",
                rental.id, rental.amount_paid
            ),
            driver,
        };
        self.notifications
            .broadcast(&rental, NotificationReason::LocationCancelled, messages)
            .await;
        Ok(rental)
    }
}

fn pending_rental(
    vehicle: &Vehicle,
    driver_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rental_type: RentalType,
    quote: &Quote,
    customer: Customer,
) -> Rental {
    let now = Utc::now();
    Rental {
        id: Uuid::new_v4(),
        client_id: customer.client_id,
        client_name: customer.name,
        client_phone: Some(customer.phone),
        organization_id: vehicle.organization_id,
        agency_id: vehicle.agency_id,
        vehicle_id: vehicle.id,
        driver_id,
        start_date: start,
        end_date: end,
        rental_type,
        status: RentalStatus::Pending,
        total_amount: quote.total,
        amount_paid: Decimal::ZERO,
        commission_amount: quote.commission,
        deposit_amount: quote.deposit,
        created_at: now,
        updated_at: now,
    }
}
