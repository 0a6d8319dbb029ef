//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, notifications, pricing, rentals, schedules};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fleetrent API",
        version = "1.0.0",
        description = "Vehicle rental lifecycle, payments and resource calendars"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Rentals
        rentals::quote_rental,
        rentals::initiate_rental,
        rentals::initiate_walk_in,
        rentals::list_rentals,
        rentals::get_rental,
        rentals::start_rental,
        rentals::signal_end,
        rentals::validate_return,
        rentals::cancel_rental,
        // Payments
        rentals::list_payments,
        rentals::record_payment,
        // Schedules
        schedules::create_entry,
        schedules::future_schedule,
        schedules::conflicts,
        // Pricing
        pricing::get_price,
        pricing::set_price,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::delete_notification,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::RentalStatus,
            crate::models::enums::RentalType,
            crate::models::enums::ResourceType,
            crate::models::enums::ScheduleStatus,
            crate::models::enums::NotificationTarget,
            crate::models::enums::NotificationReason,
            crate::models::enums::PaymentMethod,
            // Rentals
            crate::models::rental::Rental,
            crate::models::rental::InitiateRental,
            crate::models::rental::WalkInRental,
            crate::models::rental::QuoteRequest,
            crate::models::rental::RentalInitResponse,
            crate::models::rental::DriverBookingRefusal,
            crate::services::quote::Quote,
            super::RentalPage,
            // Payments
            crate::models::payment::Payment,
            crate::models::payment::PaymentRequest,
            rentals::PaymentResponse,
            // Schedules
            crate::models::schedule::ScheduleEntry,
            crate::models::schedule::CreateScheduleEntry,
            // Pricing
            crate::models::pricing::Pricing,
            crate::models::pricing::SetPricing,
            // Notifications
            crate::models::notification::Notification,
            notifications::UnreadCount,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rentals", description = "Rental lifecycle"),
        (name = "payments", description = "Rental payments"),
        (name = "schedules", description = "Vehicle and driver calendars"),
        (name = "pricing", description = "Resource pricing"),
        (name = "notifications", description = "Notification inbox")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the handlers
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
