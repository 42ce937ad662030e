use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError, Paginated};
use campus_models::ids::{CourseId, EventId};
use tracing::instrument;

use super::model::{CalendarEvent, CreateEventDto, EventFilterParams, UpdateEventDto};
use super::service::CalendarService;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// List calendar events
#[utoipa::path(
    get,
    path = "/api/calendar",
    params(EventFilterParams),
    responses(
        (status = 200, description = "Events overlapping the window", body = ApiResponse<Paginated<CalendarEvent>>),
        (status = 400, description = "Malformed window"),
    ),
    security(("bearer_auth" = [])),
    tag = "Calendar"
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_events(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(filters): Query<EventFilterParams>,
) -> Result<Json<ApiResponse<Paginated<CalendarEvent>>>, AppError> {
    let events = CalendarService::get_events(&state.db, filters).await?;
    Ok(Json(ApiResponse::success(events)))
}

/// Create a calendar event
#[utoipa::path(
    post,
    path = "/api/calendar",
    request_body = CreateEventDto,
    responses(
        (status = 201, description = "Event created", body = ApiResponse<CalendarEvent>),
        (status = 400, description = "Validation error or unknown course"),
        (status = 403, description = "Staff only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Calendar"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn create_event(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidatedJson(dto): ValidatedJson<CreateEventDto>,
) -> Result<(StatusCode, Json<ApiResponse<CalendarEvent>>), AppError> {
    let event = CalendarService::create_event(&state.db, &auth_user.actor(), dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(event, "Event created")),
    ))
}

/// Get a calendar event
#[utoipa::path(
    get,
    path = "/api/calendar/{id}",
    params(("id" = EventId, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event", body = ApiResponse<CalendarEvent>),
        (status = 404, description = "Event not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Calendar"
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_event(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<EventId>,
) -> Result<Json<ApiResponse<CalendarEvent>>, AppError> {
    let event = CalendarService::get_event(&state.db, id).await?;
    Ok(Json(ApiResponse::success(event)))
}

/// Update a calendar event
#[utoipa::path(
    put,
    path = "/api/calendar/{id}",
    params(("id" = EventId, Path, description = "Event ID")),
    request_body = UpdateEventDto,
    responses(
        (status = 200, description = "Event updated", body = ApiResponse<CalendarEvent>),
        (status = 403, description = "Not an admin or the event creator"),
        (status = 404, description = "Event not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Calendar"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn update_event(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<EventId>,
    ValidatedJson(dto): ValidatedJson<UpdateEventDto>,
) -> Result<Json<ApiResponse<CalendarEvent>>, AppError> {
    let event = CalendarService::update_event(&state.db, &auth_user.actor(), id, dto).await?;
    Ok(Json(ApiResponse::with_message(event, "Event updated")))
}

/// Delete a calendar event
#[utoipa::path(
    delete,
    path = "/api/calendar/{id}",
    params(("id" = EventId, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 403, description = "Not an admin or the event creator"),
        (status = 404, description = "Event not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Calendar"
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_event(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<EventId>,
) -> Result<StatusCode, AppError> {
    CalendarService::delete_event(&state.db, &auth_user.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Events linked to a course
#[utoipa::path(
    get,
    path = "/api/calendar/course/{course_id}",
    params(("course_id" = CourseId, Path, description = "Course ID"), EventFilterParams),
    responses(
        (status = 200, description = "Course events", body = ApiResponse<Paginated<CalendarEvent>>),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Calendar"
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_course_events(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(course_id): Path<CourseId>,
    Query(filters): Query<EventFilterParams>,
) -> Result<Json<ApiResponse<Paginated<CalendarEvent>>>, AppError> {
    let events = CalendarService::get_course_events(&state.db, course_id, filters).await?;
    Ok(Json(ApiResponse::success(events)))
}
