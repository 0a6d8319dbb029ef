//! Vehicle and driver calendar endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::ResourceType,
        schedule::{ConflictQuery, CreateScheduleEntry, ScheduleEntry},
    },
};

use super::AuthenticatedUser;

/// Block a vehicle or driver calendar
#[utoipa::path(
    post,
    path = "/schedules",
    tag = "schedules",
    security(("bearer_auth" = [])),
    request_body = CreateScheduleEntry,
    responses(
        (status = 201, description = "Schedule entry created", body = ScheduleEntry),
        (status = 400, description = "Empty, inverted or back-dated window"),
        (status = 403, description = "Organization staff only")
    )
)]
pub async fn create_entry(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateScheduleEntry>,
) -> AppResult<(StatusCode, Json<ScheduleEntry>)> {
    let organization_id = claims.require_organization_staff()?;
    let entry = state.services.availability.create(organization_id, data).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Upcoming calendar of a resource
#[utoipa::path(
    get,
    path = "/schedules/{resource_type}/{resource_id}",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(
        ("resource_type" = ResourceType, Path, description = "VEHICLE or DRIVER"),
        ("resource_id" = Uuid, Path, description = "Resource ID")
    ),
    responses(
        (status = 200, description = "Entries not yet ended, by start date", body = Vec<ScheduleEntry>)
    )
)]
pub async fn future_schedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path((resource_type, resource_id)): Path<(ResourceType, Uuid)>,
) -> AppResult<Json<Vec<ScheduleEntry>>> {
    let entries = state
        .services
        .availability
        .future_schedule(resource_type, resource_id)
        .await?;
    Ok(Json(entries))
}

/// Blocking entries overlapping a window
#[utoipa::path(
    get,
    path = "/schedules/{resource_type}/{resource_id}/conflicts",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(
        ("resource_type" = ResourceType, Path, description = "VEHICLE or DRIVER"),
        ("resource_id" = Uuid, Path, description = "Resource ID"),
        ConflictQuery
    ),
    responses(
        (status = 200, description = "Conflicting entries", body = Vec<ScheduleEntry>),
        (status = 400, description = "Invalid window")
    )
)]
pub async fn conflicts(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path((resource_type, resource_id)): Path<(ResourceType, Uuid)>,
    Query(query): Query<ConflictQuery>,
) -> AppResult<Json<Vec<ScheduleEntry>>> {
    let entries = state
        .services
        .availability
        .conflicts(resource_type, resource_id, query.start, query.end)
        .await?;
    Ok(Json(entries))
}
