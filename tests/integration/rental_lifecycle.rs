//! End-to-end rental lifecycle tests over the in-memory backend

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use fleetrent_server::{
    config::RentalsConfig,
    error::AppError,
    models::{
        directory::{Agency, Organization, Vehicle},
        enums::{
            NotificationReason, NotificationTarget, PaymentMethod, RentalStatus, RentalType, ResourceType,
            ScheduleStatus,
        },
        payment::{PaymentRequest, SettlementOutcome},
        pricing::SetPricing,
        rental::{InitiateRental, InitiationOutcome, WalkInRental},
        user::Actor,
    },
    repository::{memory::MemoryStore, Repository},
    services::{notifications::NotificationDispatcher, Services},
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct Harness {
    services: Services,
    repository: Repository,
    organization_id: Uuid,
    agency_id: Uuid,
    vehicle_id: Uuid,
    driver_id: Uuid,
    client_id: Uuid,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let organization = Organization {
            id: Uuid::new_v4(),
            name: "Sahel Mobility".to_string(),
            requires_driver_booking: true,
            email: Some("contact@sahel.example".to_string()),
        };
        let agency = Agency {
            id: Uuid::new_v4(),
            organization_id: organization.id,
            name: "Plateau".to_string(),
            email: None,
            phone: Some("+22501020304".to_string()),
            deposit_percentage: dec("30"),
            monthly_revenue: Decimal::ZERO,
        };
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            organization_id: organization.id,
            agency_id: agency.id,
        };
        let (organization_id, agency_id, vehicle_id) = (organization.id, agency.id, vehicle.id);
        store.put_organization(organization).unwrap();
        store.put_agency(agency).unwrap();
        store.put_vehicle(vehicle).unwrap();

        let repository = Repository::memory(store);
        let dispatcher = NotificationDispatcher::inline(repository.notifications.clone());
        let services = Services::new(repository.clone(), RentalsConfig::default(), dispatcher);

        let harness = Self {
            services,
            repository,
            organization_id,
            agency_id,
            vehicle_id,
            driver_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
        };
        harness.price(ResourceType::Vehicle, harness.vehicle_id, "100", "1000").await;
        harness.price(ResourceType::Driver, harness.driver_id, "50", "500").await;
        harness
    }

    async fn price(&self, resource_type: ResourceType, resource_id: Uuid, per_hour: &str, per_day: &str) {
        let data = SetPricing {
            price_per_hour: dec(per_hour),
            price_per_day: dec(per_day),
            currency: None,
        };
        self.services
            .pricing
            .set_price(self.organization_id, resource_type, resource_id, &data)
            .await
            .unwrap();
    }

    fn request(&self, start: DateTime<Utc>, days: i64) -> InitiateRental {
        InitiateRental {
            vehicle_id: self.vehicle_id,
            driver_id: self.driver_id,
            start_date: start,
            end_date: start + Duration::days(days),
            rental_type: RentalType::Daily,
            client_phone: "+22507070707".to_string(),
            client_name: Some("Awa".to_string()),
        }
    }

    /// Two-day rental starting tomorrow, total 4500
    async fn book(&self) -> Uuid {
        let start = Utc::now() + Duration::days(1);
        match self
            .services
            .rentals
            .initiate_client(self.client_id, self.request(start, 2))
            .await
            .unwrap()
        {
            InitiationOutcome::Created(response) => response.rental_id,
            InitiationOutcome::Refused(_) => panic!("booking was refused"),
        }
    }

    async fn pay(&self, rental_id: Uuid, amount: &str, key: Option<&str>) -> Result<SettlementOutcome, AppError> {
        let request = PaymentRequest {
            amount: dec(amount),
            method: PaymentMethod::MobileMoney,
            idempotency_key: key.map(str::to_string),
        };
        self.services
            .payments
            .record_payment(rental_id, Actor::Client(self.client_id), request)
            .await
    }

    async fn status(&self, rental_id: Uuid) -> RentalStatus {
        self.repository.rentals.get_by_id(rental_id).await.unwrap().status
    }

    async fn blocks(&self, rental_id: Uuid, status: ScheduleStatus) -> usize {
        self.services
            .availability
            .rental_blocks(rental_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.status == status)
            .count()
    }

    async fn driver_notices(&self, reason: NotificationReason) -> usize {
        self.services
            .notifications
            .inbox(NotificationTarget::Driver, self.driver_id, false)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.reason == reason)
            .count()
    }
}

#[tokio::test]
async fn test_scenario_quote_amounts() {
    let h = Harness::new().await;
    let start = Utc::now() + Duration::days(1);

    let response = match h
        .services
        .rentals
        .initiate_client(h.client_id, h.request(start, 2))
        .await
        .unwrap()
    {
        InitiationOutcome::Created(response) => response,
        InitiationOutcome::Refused(_) => panic!("booking was refused"),
    };

    assert_eq!(response.units, 2);
    assert_eq!(response.subtotal, dec("3000"));
    assert_eq!(response.commission, dec("600"));
    assert_eq!(response.deposit, dec("900"));
    assert_eq!(response.total, dec("4500"));
    assert_eq!(response.status, RentalStatus::Pending);

    let rental = h.repository.rentals.get_by_id(response.rental_id).await.unwrap();
    assert_eq!(rental.amount_paid, Decimal::ZERO);
    assert_eq!(rental.organization_id, h.organization_id);
    assert_eq!(h.driver_notices(NotificationReason::Reservation).await, 0);
}

#[tokio::test]
async fn test_scenario_deposit_then_balance() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    let first = assert_ok!(h.pay(rental_id, "2700", None).await);
    assert_eq!(first.rental.status, RentalStatus::Reserved);
    assert!(first.calendar_blocked);
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Rented).await, 2);
    assert_eq!(h.driver_notices(NotificationReason::PaymentReceived).await, 1);

    let second = assert_ok!(h.pay(rental_id, "1800", None).await);
    assert_eq!(second.rental.status, RentalStatus::Paid);
    assert!(!second.calendar_blocked);
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Rented).await, 2);
    assert_eq!(h.driver_notices(NotificationReason::PaymentReceived).await, 1);

    // client and agency hear about every payment
    let client_notices = h
        .services
        .notifications
        .inbox(NotificationTarget::Client, h.client_id, false)
        .await
        .unwrap();
    let payment_notices = client_notices
        .iter()
        .filter(|n| n.reason == NotificationReason::PaymentReceived)
        .count();
    assert_eq!(payment_notices, 2);

    let agency = h.repository.directory.get_agency(h.agency_id).await.unwrap();
    assert_eq!(agency.monthly_revenue, dec("4500"));

    let payments = h.repository.rentals.list_payments(rental_id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_ne!(payments[0].transaction_ref, payments[1].transaction_ref);
}

#[tokio::test]
async fn test_scenario_start_requires_paid() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    let result = h.services.rentals.start(rental_id, h.agency_id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(h.status(rental_id).await, RentalStatus::Pending);

    h.pay(rental_id, "3000", None).await.unwrap();
    let result = h.services.rentals.start(rental_id, h.agency_id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(h.status(rental_id).await, RentalStatus::Reserved);
}

#[tokio::test]
async fn test_scenario_return_blocks_maintenance() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    h.pay(rental_id, "4500", None).await.unwrap();
    assert_ok!(h.services.rentals.start(rental_id, h.agency_id).await);

    // validating before the client signals the end is refused
    let early = h.services.rentals.validate_return(rental_id, h.agency_id).await;
    assert!(matches!(early, Err(AppError::InvalidState(_))));

    // a client-booked rental is ended by its client, not the agency
    let by_agency = h.services.rentals.signal_end(rental_id, Actor::Agency(h.agency_id)).await;
    assert!(matches!(by_agency, Err(AppError::Authorization(_))));

    let reviewed = h.services.rentals.signal_end(rental_id, Actor::Client(h.client_id)).await.unwrap();
    assert_eq!(reviewed.status, RentalStatus::UnderReview);

    let completed = h.services.rentals.validate_return(rental_id, h.agency_id).await.unwrap();
    assert_eq!(completed.status, RentalStatus::Completed);

    let maintenance: Vec<_> = h
        .services
        .availability
        .rental_blocks(rental_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.status == ScheduleStatus::Maintenance)
        .collect();
    assert_eq!(maintenance.len(), 2);
    for entry in &maintenance {
        assert_eq!(entry.start_date, completed.end_date);
        assert_eq!(entry.end_date, completed.end_date + Duration::hours(24));
    }
    assert!(maintenance.iter().any(|e| e.resource_type == ResourceType::Vehicle));
    assert!(maintenance.iter().any(|e| e.resource_type == ResourceType::Driver));

    assert_eq!(h.driver_notices(NotificationReason::LocationEnd).await, 1);

    // completed rentals take no more payments
    let late = h.pay(rental_id, "10", None).await;
    assert!(matches!(late, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_return_skips_maintenance_when_vehicle_rebooked() {
    let h = Harness::new().await;
    let rental_id = h.book().await;
    let rental = h.repository.rentals.get_by_id(rental_id).await.unwrap();

    // next rental on the same vehicle starts right at the end, with another driver
    let next_driver = Uuid::new_v4();
    h.price(ResourceType::Driver, next_driver, "50", "500").await;
    let mut next = h.request(rental.end_date, 1);
    next.driver_id = next_driver;
    let next_client = Uuid::new_v4();
    assert_ok!(h.services.rentals.initiate_client(next_client, next).await);

    h.pay(rental_id, "4500", None).await.unwrap();
    h.services.rentals.start(rental_id, h.agency_id).await.unwrap();
    h.services.rentals.signal_end(rental_id, Actor::Client(h.client_id)).await.unwrap();
    let completed = h.services.rentals.validate_return(rental_id, h.agency_id).await.unwrap();

    assert_eq!(completed.status, RentalStatus::Completed);
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Maintenance).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirmations_block_once() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    let pay = move |services: Services, client_id: Uuid| async move {
        let request = PaymentRequest {
            amount: dec("2700"),
            method: PaymentMethod::Cash,
            idempotency_key: None,
        };
        services
            .payments
            .record_payment(rental_id, Actor::Client(client_id), request)
            .await
    };

    let first = tokio::spawn(pay(h.services.clone(), h.client_id));
    let second = tokio::spawn(pay(h.services.clone(), h.client_id));
    let (first, second) = tokio::join!(first, second);
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    assert_eq!(
        [first.calendar_blocked, second.calendar_blocked].iter().filter(|b| **b).count(),
        1
    );
    assert_eq!(h.status(rental_id).await, RentalStatus::Paid);
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Rented).await, 2);
    assert_eq!(h.driver_notices(NotificationReason::PaymentReceived).await, 1);
}

#[tokio::test]
async fn test_payment_replay_is_not_charged_twice() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    let first = h.pay(rental_id, "1000", Some("attempt-1")).await.unwrap();
    assert!(!first.is_replay());

    let replay = h.pay(rental_id, "1000", Some("attempt-1")).await.unwrap();
    assert!(replay.is_replay());
    assert_eq!(replay.rental.amount_paid, dec("1000"));

    assert_eq!(h.repository.rentals.list_payments(rental_id).await.unwrap().len(), 1);
    let agency = h.repository.directory.get_agency(h.agency_id).await.unwrap();
    assert_eq!(agency.monthly_revenue, dec("1000"));
}

#[tokio::test]
async fn test_non_positive_payment_is_rejected() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    assert!(matches!(h.pay(rental_id, "0", None).await, Err(AppError::Validation(_))));
    assert!(matches!(h.pay(rental_id, "-5", None).await, Err(AppError::Validation(_))));
    assert!(matches!(h.pay(Uuid::new_v4(), "5", None).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_cancel_releases_calendar() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    h.pay(rental_id, "2700", None).await.unwrap();
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Rented).await, 2);

    let cancelled = h
        .services
        .rentals
        .cancel(rental_id, Actor::Client(h.client_id))
        .await
        .unwrap();
    assert_eq!(cancelled.status, RentalStatus::Cancelled);
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Rented).await, 0);
    assert_eq!(h.driver_notices(NotificationReason::LocationCancelled).await, 1);

    // the window is free again
    let rebooked = h.book().await;
    assert_ne!(rebooked, rental_id);
}

#[tokio::test]
async fn test_initiation_conflicts() {
    let h = Harness::new().await;
    let rental_id = h.book().await;
    let rental = h.repository.rentals.get_by_id(rental_id).await.unwrap();

    // same vehicle and driver, overlapping window
    let overlapping = h.request(rental.start_date + Duration::hours(12), 2);
    let result = h.services.rentals.initiate_client(Uuid::new_v4(), overlapping).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // touching windows do not conflict
    let touching = h.request(rental.end_date, 1);
    assert_ok!(h.services.rentals.initiate_client(Uuid::new_v4(), touching).await);

    // a manual block on the driver prevents the booking
    let far = Utc::now() + Duration::days(30);
    h.services
        .availability
        .add_unavailability(
            h.organization_id,
            ResourceType::Driver,
            h.driver_id,
            far,
            far + Duration::days(1),
            ScheduleStatus::Unavailable,
            Some("Leave".to_string()),
        )
        .await
        .unwrap();
    let blocked = h.request(far - Duration::hours(6), 1);
    let result = h.services.rentals.initiate_client(Uuid::new_v4(), blocked).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_walk_in_rentals() {
    let h = Harness::new().await;
    let start = Utc::now() + Duration::days(1);
    let request = || WalkInRental {
        vehicle_id: h.vehicle_id,
        driver_id: h.driver_id,
        start_date: start,
        end_date: start + Duration::days(2),
        rental_type: RentalType::Daily,
        client_name: "Moussa".to_string(),
        client_phone: "+22505050505".to_string(),
    };

    let foreign = h.services.rentals.initiate_walk_in(Uuid::new_v4(), request()).await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    let created = h.services.rentals.initiate_walk_in(h.agency_id, request()).await.unwrap();
    assert_eq!(created.deposit, dec("900"));
    assert_eq!(created.total, dec("4500"));

    let rental = h.repository.rentals.get_by_id(created.rental_id).await.unwrap();
    assert!(rental.client_id.is_none());
    assert_eq!(rental.client_name.as_deref(), Some("Moussa"));

    let notices = h.services.notifications.for_rental(created.rental_id).await.unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].resource_type, NotificationTarget::Agency);

    // agency records the cash payment on behalf of the customer
    let request = PaymentRequest {
        amount: dec("4500"),
        method: PaymentMethod::Cash,
        idempotency_key: None,
    };
    let outcome = h
        .services
        .payments
        .record_payment(created.rental_id, Actor::Agency(h.agency_id), request)
        .await
        .unwrap();
    assert_eq!(outcome.rental.status, RentalStatus::Paid);

    let stranger = h.services.rentals.cancel(created.rental_id, Actor::Client(h.client_id)).await;
    assert_err!(stranger);
}

#[tokio::test]
async fn test_walk_in_runs_to_completion() {
    let h = Harness::new().await;
    let start = Utc::now() + Duration::days(1);
    let request = WalkInRental {
        vehicle_id: h.vehicle_id,
        driver_id: h.driver_id,
        start_date: start,
        end_date: start + Duration::days(2),
        rental_type: RentalType::Daily,
        client_name: "Moussa".to_string(),
        client_phone: "+22505050505".to_string(),
    };
    let rental_id = h.services.rentals.initiate_walk_in(h.agency_id, request).await.unwrap().rental_id;

    let payment = PaymentRequest {
        amount: dec("4500"),
        method: PaymentMethod::Cash,
        idempotency_key: None,
    };
    h.services
        .payments
        .record_payment(rental_id, Actor::Agency(h.agency_id), payment)
        .await
        .unwrap();
    assert_ok!(h.services.rentals.start(rental_id, h.agency_id).await);

    let stranger = h.services.rentals.signal_end(rental_id, Actor::Agency(Uuid::new_v4())).await;
    assert!(matches!(stranger, Err(AppError::NotFound(_))));

    let reviewed = h.services.rentals.signal_end(rental_id, Actor::Agency(h.agency_id)).await.unwrap();
    assert_eq!(reviewed.status, RentalStatus::UnderReview);

    let completed = h.services.rentals.validate_return(rental_id, h.agency_id).await.unwrap();
    assert_eq!(completed.status, RentalStatus::Completed);
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Rented).await, 2);
    assert_eq!(h.blocks(rental_id, ScheduleStatus::Maintenance).await, 2);
}

#[tokio::test]
async fn test_sub_cent_payment_is_rejected() {
    let h = Harness::new().await;
    let rental_id = h.book().await;

    let result = h.pay(rental_id, "2699.996", None).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    let result = h.pay(rental_id, "0.004", None).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    assert_eq!(h.status(rental_id).await, RentalStatus::Pending);
    assert!(h.repository.rentals.list_payments(rental_id).await.unwrap().is_empty());

    // trailing zeros are fine
    let outcome = h.pay(rental_id, "2700.000", None).await.unwrap();
    assert_eq!(outcome.rental.status, RentalStatus::Reserved);
}

#[tokio::test]
async fn test_refused_booking_creates_nothing() {
    let store = Arc::new(MemoryStore::new());
    let organization = Organization {
        id: Uuid::new_v4(),
        name: "Self Drive Co".to_string(),
        requires_driver_booking: false,
        email: Some("hello@selfdrive.example".to_string()),
    };
    let agency = Agency {
        id: Uuid::new_v4(),
        organization_id: organization.id,
        name: "Airport".to_string(),
        email: Some("airport@selfdrive.example".to_string()),
        phone: None,
        deposit_percentage: dec("25"),
        monthly_revenue: Decimal::ZERO,
    };
    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        organization_id: organization.id,
        agency_id: agency.id,
    };
    let vehicle_id = vehicle.id;
    store.put_organization(organization).unwrap();
    store.put_agency(agency).unwrap();
    store.put_vehicle(vehicle).unwrap();

    let repository = Repository::memory(store);
    let services = Services::new(
        repository.clone(),
        RentalsConfig::default(),
        NotificationDispatcher::inline(repository.notifications.clone()),
    );

    let start = Utc::now() + Duration::days(1);
    let request = InitiateRental {
        vehicle_id,
        driver_id: Uuid::new_v4(),
        start_date: start,
        end_date: start + Duration::days(1),
        rental_type: RentalType::Daily,
        client_phone: "+22507070707".to_string(),
        client_name: None,
    };
    let outcome = services.rentals.initiate_client(Uuid::new_v4(), request).await.unwrap();
    let refusal = match outcome {
        InitiationOutcome::Refused(refusal) => refusal,
        InitiationOutcome::Created(_) => panic!("booking should be refused"),
    };
    assert_eq!(refusal.agency_email.as_deref(), Some("airport@selfdrive.example"));
    assert_eq!(refusal.organization_email.as_deref(), Some("hello@selfdrive.example"));
}
