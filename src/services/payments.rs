//! Payment reconciliation
//!
//! The payment insert, the cumulative amount, the status derivation and the
//! first-confirmation calendar blocks commit together in the storage layer.
//! Revenue accounting and notifications follow the commit and never undo it.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::NotificationReason,
        payment::{Payment, PaymentRequest, SettlementOutcome},
        user::Actor,
    },
    repository::Repository,
    services::{
        notifications::{FanoutMessages, NotificationsService},
        rentals::RentalsService,
    },
};

/// Positive amount with at most 2 decimal places, as stored
fn ensure_payable_amount(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "Payment amount must be positive, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::Validation(format!(
            "Payment amount must have at most 2 decimal places, got {}",
            amount
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PaymentsService {
    repository: Repository,
    rentals: RentalsService,
    notifications: NotificationsService,
}

impl PaymentsService {
    pub fn new(repository: Repository, rentals: RentalsService, notifications: NotificationsService) -> Self {
        Self {
            repository,
            rentals,
            notifications,
        }
    }

    /// Record a payment against a rental the actor owns
    pub async fn record_payment(
        &self,
        rental_id: Uuid,
        actor: Actor,
        request: PaymentRequest,
    ) -> AppResult<SettlementOutcome> {
        request.validate()?;
        ensure_payable_amount(request.amount)?;

        self.rentals.owned(rental_id, actor).await?;

        let payment = Payment::new(
            rental_id,
            request.amount,
            request.method,
            request.idempotency_key,
            Utc::now(),
        );
        let outcome = self.repository.rentals.settle_payment(&payment).await?;

        if outcome.is_replay() {
            tracing::info!(rental_id = %rental_id, "Duplicate payment request ignored");
            return Ok(outcome);
        }

        let rental = &outcome.rental;
        tracing::info!(
            rental_id = %rental.id,
            transaction_ref = %payment.transaction_ref,
            amount = %payment.amount,
            previous_status = %outcome.previous_status,
            status = %rental.status,
            calendar_blocked = outcome.calendar_blocked,
            "Payment recorded"
        );

        if let Err(e) = self
            .repository
            .directory
            .add_monthly_revenue(rental.agency_id, payment.amount)
            .await
        {
            tracing::warn!(
                agency_id = %rental.agency_id,
                amount = %payment.amount,
                error = %e,
                "Failed to update agency monthly revenue"
            );
        }

        let progress = format!(
            "{} of {} paid, status {}",
            rental.amount_paid, rental.total_amount, rental.status
        );
        let driver = outcome.calendar_blocked.then(|| {
            format!(
                "You are booked for rental {} from {} to {}",
                rental.id,
                rental.start_date.to_rfc3339(),
                rental.end_date.to_rfc3339()
            )
        });
        let messages = FanoutMessages {
            client: Some(format!(
                "Payment of {} received for rental {} ({})",
                payment.amount, rental.id, progress
            )),
            agency: format!(
                "Payment {} of {} received for rental {} ({})",
                payment.transaction_ref, payment.amount, rental.id, progress
            ),
            driver,
        };
        self.notifications
            .broadcast(rental, NotificationReason::PaymentReceived, messages)
            .await;

        Ok(outcome)
    }
}
