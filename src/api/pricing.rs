//! Resource pricing endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::ResourceType,
        pricing::{Pricing, SetPricing},
    },
};

use super::AuthenticatedUser;

/// Get the price of a vehicle or driver
#[utoipa::path(
    get,
    path = "/pricing/{resource_type}/{resource_id}",
    tag = "pricing",
    security(("bearer_auth" = [])),
    params(
        ("resource_type" = ResourceType, Path, description = "VEHICLE or DRIVER"),
        ("resource_id" = Uuid, Path, description = "Resource ID")
    ),
    responses(
        (status = 200, description = "Active price", body = Pricing),
        (status = 404, description = "No price set")
    )
)]
pub async fn get_price(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path((resource_type, resource_id)): Path<(ResourceType, Uuid)>,
) -> AppResult<Json<Pricing>> {
    let pricing = state.services.pricing.get_price(resource_type, resource_id).await?;
    Ok(Json(pricing))
}

/// Set the price of a vehicle or driver
#[utoipa::path(
    put,
    path = "/pricing/{resource_type}/{resource_id}",
    tag = "pricing",
    security(("bearer_auth" = [])),
    params(
        ("resource_type" = ResourceType, Path, description = "VEHICLE or DRIVER"),
        ("resource_id" = Uuid, Path, description = "Resource ID")
    ),
    request_body = SetPricing,
    responses(
        (status = 200, description = "Price saved", body = Pricing),
        (status = 400, description = "Negative price or bad currency code"),
        (status = 403, description = "Organization staff only")
    )
)]
pub async fn set_price(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((resource_type, resource_id)): Path<(ResourceType, Uuid)>,
    Json(data): Json<SetPricing>,
) -> AppResult<Json<Pricing>> {
    let organization_id = claims.require_organization_staff()?;
    let pricing = state
        .services
        .pricing
        .set_price(organization_id, resource_type, resource_id, &data)
        .await?;
    Ok(Json(pricing))
}
