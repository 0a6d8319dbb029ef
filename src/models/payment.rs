//! Payment model (append-only)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snowflaked::sync::Generator;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::{PaymentMethod, RentalStatus};
use super::rental::Rental;

static TRANSACTION_IDS: Generator = Generator::new(0);

/// Payment record, never mutated once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// System-generated, unique per payment
    pub transaction_ref: String,
    pub idempotency_key: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        rental_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rental_id,
            amount,
            method,
            transaction_ref: next_transaction_ref(),
            idempotency_key,
            transaction_date: now,
        }
    }
}

/// Time-ordered unique reference, e.g. `TXN-7171611431287504896`
pub fn next_transaction_ref() -> String {
    let id: u64 = TRANSACTION_IDS.generate();
    format!("TXN-{}", id)
}

/// Payment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Client-supplied token; replays with the same key are not charged twice
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

/// Result of settling a payment against a rental
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub rental: Rental,
    /// None when the idempotency key matched an earlier payment
    pub payment: Option<Payment>,
    pub previous_status: RentalStatus,
    /// True when this payment blocked the vehicle and driver calendars
    pub calendar_blocked: bool,
}

impl SettlementOutcome {
    pub fn is_replay(&self) -> bool {
        self.payment.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_transaction_refs_are_unique() {
        let refs: HashSet<String> = (0..1000).map(|_| next_transaction_ref()).collect();
        assert_eq!(refs.len(), 1000);
        assert!(refs.iter().all(|r| r.starts_with("TXN-")));
    }
}
