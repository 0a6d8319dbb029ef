//! Rentals and payments repository

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use super::schedules::insert_entry;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{RentalStatus, ResourceType},
        payment::{Payment, SettlementOutcome},
        rental::{CancelOutcome, Rental, RentalFilter, ReturnOutcome},
    },
};

#[async_trait]
pub trait RentalsRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Rental>;
    /// Rentals matching the filter, newest first, with the total count
    async fn list(&self, filter: &RentalFilter) -> AppResult<(Vec<Rental>, i64)>;
    /// Insert a new rental unless its vehicle or driver is blocked or booked
    /// by another live rental over the same window (`Conflict`)
    async fn insert_if_available(&self, rental: &Rental) -> AppResult<()>;
    /// Compare-and-set status change
    async fn transition(&self, id: Uuid, from: &[RentalStatus], to: RentalStatus) -> AppResult<Rental>;
    /// Record a payment, derive the new status and, when the payment confirms
    /// the rental, block vehicle and driver calendars, all in one unit of work
    async fn settle_payment(&self, payment: &Payment) -> AppResult<SettlementOutcome>;
    /// UNDER_REVIEW -> COMPLETED, then block the maintenance window when no
    /// other live rental of the vehicle overlaps it
    async fn complete_return(&self, id: Uuid, maintenance_window: Duration) -> AppResult<ReturnOutcome>;
    /// Cancel a rental and release its RENTED calendar blocks
    async fn cancel(&self, id: Uuid) -> AppResult<CancelOutcome>;
    async fn list_payments(&self, rental_id: Uuid) -> AppResult<Vec<Payment>>;
}

pub(crate) fn rental_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Rental {} not found", id))
}

pub(crate) fn booking_conflict(rental: &Rental, resource_type: ResourceType) -> AppError {
    let resource_id = match resource_type {
        ResourceType::Vehicle => rental.vehicle_id,
        ResourceType::Driver => rental.driver_id,
    };
    AppError::Conflict(format!(
        "{} {} is not available between {} and {}",
        match resource_type {
            ResourceType::Vehicle => "Vehicle",
            ResourceType::Driver => "Driver",
        },
        resource_id,
        rental.start_date.to_rfc3339(),
        rental.end_date.to_rfc3339()
    ))
}

pub(crate) fn payment_on_closed_rental(rental: &Rental) -> AppError {
    AppError::InvalidState(format!(
        "Rental {} is {}, payments are no longer accepted",
        rental.id, rental.status
    ))
}

#[derive(Clone)]
pub struct PgRentalsRepository {
    pool: Pool<Postgres>,
}

impl PgRentalsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn lock_rental(conn: &mut PgConnection, id: Uuid) -> AppResult<Rental> {
        sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| rental_not_found(id))
    }

    async fn save_status(conn: &mut PgConnection, rental: &Rental) -> AppResult<()> {
        sqlx::query("UPDATE rentals SET status = $1, amount_paid = $2, updated_at = $3 WHERE id = $4")
            .bind(rental.status)
            .bind(rental.amount_paid)
            .bind(rental.updated_at)
            .bind(rental.id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RentalsRepository for PgRentalsRepository {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Rental> {
        sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| rental_not_found(id))
    }

    async fn list(&self, filter: &RentalFilter) -> AppResult<(Vec<Rental>, i64)> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.agency_id.is_some() {
            conditions.push(format!("agency_id = ${}", idx));
            idx += 1;
        }
        if filter.client_id.is_some() {
            conditions.push(format!("client_id = ${}", idx));
            idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total
        let count_q = format!("SELECT COUNT(*) FROM rentals {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(id) = filter.agency_id { count_builder = count_builder.bind(id); }
        if let Some(id) = filter.client_id { count_builder = count_builder.bind(id); }
        if let Some(status) = filter.status { count_builder = count_builder.bind(status); }
        let total = count_builder.fetch_one(&self.pool).await?;

        // Fetch rows
        let select_q = format!(
            "SELECT * FROM rentals {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            where_clause,
            filter.per_page,
            filter.offset()
        );
        let mut builder = sqlx::query_as::<_, Rental>(&select_q);
        if let Some(id) = filter.agency_id { builder = builder.bind(id); }
        if let Some(id) = filter.client_id { builder = builder.bind(id); }
        if let Some(status) = filter.status { builder = builder.bind(status); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn insert_if_available(&self, rental: &Rental) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Serialize bookings touching the same vehicle or driver; fixed order avoids deadlocks
        let mut keys = [rental.vehicle_id, rental.driver_id];
        keys.sort();
        for key in keys {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        let blocked: Option<ResourceType> = sqlx::query_scalar(
            r#"
            SELECT resource_type FROM schedule_entries
            WHERE ((resource_type = 'VEHICLE' AND resource_id = $1)
                OR (resource_type = 'DRIVER' AND resource_id = $2))
              AND status IN ('RENTED', 'MAINTENANCE', 'UNAVAILABLE')
              AND start_date < $4 AND end_date > $3
            ORDER BY resource_type
            LIMIT 1
            "#,
        )
        .bind(rental.vehicle_id)
        .bind(rental.driver_id)
        .bind(rental.start_date)
        .bind(rental.end_date)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(resource_type) = blocked {
            return Err(booking_conflict(rental, resource_type));
        }

        let vehicle_clash: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT vehicle_id = $1 FROM rentals
            WHERE (vehicle_id = $1 OR driver_id = $2)
              AND status NOT IN ('CANCELLED', 'COMPLETED')
              AND start_date < $4 AND end_date > $3
            LIMIT 1
            "#,
        )
        .bind(rental.vehicle_id)
        .bind(rental.driver_id)
        .bind(rental.start_date)
        .bind(rental.end_date)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(is_vehicle) = vehicle_clash {
            let resource_type = if is_vehicle { ResourceType::Vehicle } else { ResourceType::Driver };
            return Err(booking_conflict(rental, resource_type));
        }

        sqlx::query(
            r#"
            INSERT INTO rentals (
                id, client_id, client_name, client_phone, organization_id, agency_id,
                vehicle_id, driver_id, start_date, end_date, rental_type, status,
                total_amount, amount_paid, commission_amount, deposit_amount,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(rental.id)
        .bind(rental.client_id)
        .bind(&rental.client_name)
        .bind(&rental.client_phone)
        .bind(rental.organization_id)
        .bind(rental.agency_id)
        .bind(rental.vehicle_id)
        .bind(rental.driver_id)
        .bind(rental.start_date)
        .bind(rental.end_date)
        .bind(rental.rental_type)
        .bind(rental.status)
        .bind(rental.total_amount)
        .bind(rental.amount_paid)
        .bind(rental.commission_amount)
        .bind(rental.deposit_amount)
        .bind(rental.created_at)
        .bind(rental.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn transition(&self, id: Uuid, from: &[RentalStatus], to: RentalStatus) -> AppResult<Rental> {
        let mut tx = self.pool.begin().await?;
        let mut rental = Self::lock_rental(&mut tx, id).await?;
        rental.transition(from, to, Utc::now())?;
        Self::save_status(&mut tx, &rental).await?;
        tx.commit().await?;
        Ok(rental)
    }

    async fn settle_payment(&self, payment: &Payment) -> AppResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut rental = Self::lock_rental(&mut tx, payment.rental_id).await?;

        if let Some(ref key) = payment.idempotency_key {
            let seen: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM payments WHERE rental_id = $1 AND idempotency_key = $2)",
            )
            .bind(payment.rental_id)
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

            if seen {
                tx.rollback().await?;
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

        sqlx::query(
            r#"
            INSERT INTO payments (id, rental_id, amount, method, transaction_ref, idempotency_key, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id)
        .bind(payment.rental_id)
        .bind(payment.amount)
        .bind(payment.method)
        .bind(&payment.transaction_ref)
        .bind(&payment.idempotency_key)
        .bind(payment.transaction_date)
        .execute(&mut *tx)
        .await?;

        if effect.confirmed {
            for block in rental.rental_blocks(payment.transaction_date) {
                insert_entry(&mut *tx, &block).await?;
            }
        }

        Self::save_status(&mut tx, &rental).await?;
        tx.commit().await?;

        Ok(SettlementOutcome {
            rental,
            payment: Some(payment.clone()),
            previous_status: effect.previous_status,
            calendar_blocked: effect.confirmed,
        })
    }

    async fn complete_return(&self, id: Uuid, maintenance_window: Duration) -> AppResult<ReturnOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut rental = Self::lock_rental(&mut tx, id).await?;
        rental.transition(&[RentalStatus::UnderReview], RentalStatus::Completed, now)?;
        Self::save_status(&mut tx, &rental).await?;

        let (window_start, window_end) = rental.maintenance_window(maintenance_window);
        let conflicts: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM rentals
            WHERE vehicle_id = $1 AND id <> $2
              AND status NOT IN ('CANCELLED', 'COMPLETED')
              AND start_date < $4 AND end_date > $3
            "#,
        )
        .bind(rental.vehicle_id)
        .bind(rental.id)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&mut *tx)
        .await?;

        let maintenance_blocked = conflicts == 0;
        if maintenance_blocked {
            for block in rental.maintenance_blocks(maintenance_window, now) {
                insert_entry(&mut *tx, &block).await?;
            }
        }

        tx.commit().await?;
        Ok(ReturnOutcome { rental, maintenance_blocked })
    }

    async fn cancel(&self, id: Uuid) -> AppResult<CancelOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut rental = Self::lock_rental(&mut tx, id).await?;
        let previous_status = rental.transition(&RentalStatus::CANCELLABLE, RentalStatus::Cancelled, Utc::now())?;
        Self::save_status(&mut tx, &rental).await?;

        let released = sqlx::query(
            "DELETE FROM schedule_entries WHERE rental_id = $1 AND status = 'RENTED'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(CancelOutcome {
            rental,
            previous_status,
            released_blocks: released,
        })
    }

    async fn list_payments(&self, rental_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE rental_id = $1 ORDER BY transaction_date",
        )
        .bind(rental_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
