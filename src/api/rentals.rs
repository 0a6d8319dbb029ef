//! Rental lifecycle and payment endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::RentalStatus,
        payment::{Payment, PaymentRequest},
        rental::{
            InitiateRental, InitiationOutcome, QuoteRequest, Rental, RentalFilter,
            RentalInitResponse, RentalQuery, WalkInRental,
        },
    },
    services::quote::Quote,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Result of a payment submission
#[derive(Serialize, ToSchema)]
pub struct PaymentResponse {
    /// Rental after the payment
    pub rental: Rental,
    /// Recorded payment; absent when the idempotency key was already used
    pub payment: Option<Payment>,
    pub previous_status: RentalStatus,
    /// Whether this payment blocked the vehicle and driver calendars
    pub calendar_blocked: bool,
    pub balance_due: Decimal,
}

/// Price a prospective rental
#[utoipa::path(
    post,
    path = "/rentals/quote",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Computed amounts", body = Quote),
        (status = 400, description = "Invalid window"),
        (status = 404, description = "Vehicle, agency or price not found")
    )
)]
pub async fn quote_rental(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(request): Json<QuoteRequest>,
) -> AppResult<Json<Quote>> {
    let quote = state.services.rentals.quote_preview(&request).await?;
    Ok(Json(quote))
}

/// Book a vehicle with its driver (client account)
#[utoipa::path(
    post,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = InitiateRental,
    responses(
        (status = 201, description = "Rental created in PENDING", body = RentalInitResponse),
        (status = 200, description = "Organization does not take driver-inclusive bookings", body = DriverBookingRefusal),
        (status = 404, description = "Vehicle, organization or price not found"),
        (status = 409, description = "Vehicle or driver already booked")
    )
)]
pub async fn initiate_rental(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<InitiateRental>,
) -> AppResult<Response> {
    let client_id = claims.require_client()?;

    let response = match state.services.rentals.initiate_client(client_id, request).await? {
        InitiationOutcome::Created(created) => (StatusCode::CREATED, Json(created)).into_response(),
        InitiationOutcome::Refused(refusal) => (StatusCode::OK, Json(refusal)).into_response(),
    };
    Ok(response)
}

/// Register a rental for a walk-in customer (agency staff)
#[utoipa::path(
    post,
    path = "/rentals/walk-in",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = WalkInRental,
    responses(
        (status = 201, description = "Rental created in PENDING", body = RentalInitResponse),
        (status = 404, description = "Vehicle not found in this agency"),
        (status = 409, description = "Vehicle or driver already booked")
    )
)]
pub async fn initiate_walk_in(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<WalkInRental>,
) -> AppResult<(StatusCode, Json<RentalInitResponse>)> {
    let agency_id = claims.require_agency_staff()?;
    let created = state.services.rentals.initiate_walk_in(agency_id, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List rentals of the caller (client) or of the caller's agency (staff)
#[utoipa::path(
    get,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(RentalQuery),
    responses(
        (status = 200, description = "Rentals, newest first", body = RentalPage)
    )
)]
pub async fn list_rentals(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RentalQuery>,
) -> AppResult<Json<PaginatedResponse<Rental>>> {
    let (items, total) = state.services.rentals.list(&claims, &query).await?;
    let filter = RentalFilter::from_query(&query);

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: filter.page,
        per_page: filter.per_page,
    }))
}

/// Get a rental
#[utoipa::path(
    get,
    path = "/rentals/{id}",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental details", body = Rental),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn get_rental(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Rental>> {
    let rental = state.services.rentals.get(id, &claims).await?;
    Ok(Json(rental))
}

/// List the payments of a rental
#[utoipa::path(
    get,
    path = "/rentals/{id}/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Payments in chronological order", body = Vec<Payment>),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn list_payments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state.services.rentals.payments(id, &claims).await?;
    Ok(Json(payments))
}

/// Record a payment
#[utoipa::path(
    post,
    path = "/rentals/{id}/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rental ID")),
    request_body = PaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentResponse),
        (status = 200, description = "Idempotency key already used, nothing recorded", body = PaymentResponse),
        (status = 400, description = "Amount must be positive"),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental is completed or cancelled")
    )
)]
pub async fn record_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> AppResult<(StatusCode, Json<PaymentResponse>)> {
    let actor = claims.actor()?;
    let outcome = state.services.payments.record_payment(id, actor, request).await?;

    let status = if outcome.is_replay() { StatusCode::OK } else { StatusCode::CREATED };
    Ok((
        status,
        Json(PaymentResponse {
            balance_due: outcome.rental.balance_due(),
            rental: outcome.rental,
            payment: outcome.payment,
            previous_status: outcome.previous_status,
            calendar_blocked: outcome.calendar_blocked,
        }),
    ))
}

/// Hand the vehicle over (PAID -> ONGOING)
#[utoipa::path(
    post,
    path = "/rentals/{id}/start",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental started", body = Rental),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental is not PAID")
    )
)]
pub async fn start_rental(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Rental>> {
    let agency_id = claims.require_agency_staff()?;
    let rental = state.services.rentals.start(id, agency_id).await?;
    Ok(Json(rental))
}

/// Signal the end of a rental (ONGOING -> UNDER_REVIEW)
#[utoipa::path(
    post,
    path = "/rentals/{id}/end-signal",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "End signalled", body = Rental),
        (status = 403, description = "Agency staff on a rental booked by a client"),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental is not ONGOING")
    )
)]
pub async fn signal_end(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Rental>> {
    let actor = claims.actor()?;
    let rental = state.services.rentals.signal_end(id, actor).await?;
    Ok(Json(rental))
}

/// Validate the vehicle return (UNDER_REVIEW -> COMPLETED)
#[utoipa::path(
    post,
    path = "/rentals/{id}/return",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental completed", body = Rental),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental is not UNDER_REVIEW")
    )
)]
pub async fn validate_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Rental>> {
    let agency_id = claims.require_agency_staff()?;
    let rental = state.services.rentals.validate_return(id, agency_id).await?;
    Ok(Json(rental))
}

/// Cancel a rental that has not started
#[utoipa::path(
    post,
    path = "/rentals/{id}/cancel",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental cancelled", body = Rental),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental already started or closed")
    )
)]
pub async fn cancel_rental(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Rental>> {
    let actor = claims.actor()?;
    let rental = state.services.rentals.cancel(id, actor).await?;
    Ok(Json(rental))
}
