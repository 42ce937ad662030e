use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError, Paginated};
use campus_models::courses::Course;
use campus_models::ids::TeacherId;
use tracing::instrument;

use super::model::{
    AvailabilitySlot, CreateTeacherDto, Teacher, TeacherDetail, TeacherFilterParams,
    UpdateAvailabilityDto, UpdateTeacherDto,
};
use super::service::TeacherService;
use crate::middleware::auth::AuthUser;
use crate::middleware::role::RequireAdmin;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// List teachers
#[utoipa::path(
    get,
    path = "/api/teachers",
    params(TeacherFilterParams),
    responses(
        (status = 200, description = "Paginated teachers", body = ApiResponse<Paginated<Teacher>>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state))]
pub async fn get_teachers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filters): Query<TeacherFilterParams>,
) -> Result<Json<ApiResponse<Paginated<Teacher>>>, AppError> {
    let teachers = TeacherService::get_teachers(&state.db, filters).await?;
    Ok(Json(ApiResponse::success(teachers)))
}

/// Create a teacher with their identity
#[utoipa::path(
    post,
    path = "/api/teachers",
    request_body = CreateTeacherDto,
    responses(
        (status = 201, description = "Teacher created", body = ApiResponse<TeacherDetail>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state, dto))]
pub async fn create_teacher(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateTeacherDto>,
) -> Result<(StatusCode, Json<ApiResponse<TeacherDetail>>), AppError> {
    let teacher = TeacherService::create_teacher(&state.db, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(teacher, "Teacher created")),
    ))
}

/// Get a teacher
#[utoipa::path(
    get,
    path = "/api/teachers/{id}",
    params(("id" = TeacherId, Path, description = "Teacher ID")),
    responses(
        (status = 200, description = "Teacher detail", body = ApiResponse<TeacherDetail>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Teacher not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_teacher(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<TeacherId>,
) -> Result<Json<ApiResponse<TeacherDetail>>, AppError> {
    let teacher = TeacherService::get_teacher(&state.db, &auth_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(teacher)))
}

/// Update a teacher
#[utoipa::path(
    put,
    path = "/api/teachers/{id}",
    params(("id" = TeacherId, Path, description = "Teacher ID")),
    request_body = UpdateTeacherDto,
    responses(
        (status = 200, description = "Teacher updated", body = ApiResponse<Teacher>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Teacher not found"),
        (status = 409, description = "Email already registered"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn update_teacher(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<TeacherId>,
    ValidatedJson(dto): ValidatedJson<UpdateTeacherDto>,
) -> Result<Json<ApiResponse<Teacher>>, AppError> {
    let teacher = TeacherService::update_teacher(&state.db, &auth_user.actor(), id, dto).await?;
    Ok(Json(ApiResponse::with_message(teacher, "Teacher updated")))
}

/// Delete a teacher profile and deactivate the identity
#[utoipa::path(
    delete,
    path = "/api/teachers/{id}",
    params(("id" = TeacherId, Path, description = "Teacher ID")),
    responses(
        (status = 204, description = "Teacher deleted"),
        (status = 400, description = "Teacher has active courses"),
        (status = 404, description = "Teacher not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state))]
pub async fn delete_teacher(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<TeacherId>,
) -> Result<StatusCode, AppError> {
    TeacherService::delete_teacher(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Courses taught by a teacher
#[utoipa::path(
    get,
    path = "/api/teachers/{id}/courses",
    params(("id" = TeacherId, Path, description = "Teacher ID")),
    responses(
        (status = 200, description = "Courses taught", body = ApiResponse<Vec<Course>>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Teacher not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_teacher_courses(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<TeacherId>,
) -> Result<Json<ApiResponse<Vec<Course>>>, AppError> {
    let courses = TeacherService::get_teacher_courses(&state.db, &auth_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(courses)))
}

/// Weekly availability
#[utoipa::path(
    get,
    path = "/api/teachers/{id}/availability",
    params(("id" = TeacherId, Path, description = "Teacher ID")),
    responses(
        (status = 200, description = "Availability slots", body = ApiResponse<Vec<AvailabilitySlot>>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Teacher not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_availability(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<TeacherId>,
) -> Result<Json<ApiResponse<Vec<AvailabilitySlot>>>, AppError> {
    let slots = TeacherService::get_availability(&state.db, &auth_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(slots)))
}

/// Replace weekly availability
#[utoipa::path(
    put,
    path = "/api/teachers/{id}/availability",
    params(("id" = TeacherId, Path, description = "Teacher ID")),
    request_body = UpdateAvailabilityDto,
    responses(
        (status = 200, description = "Availability replaced", body = ApiResponse<Vec<AvailabilitySlot>>),
        (status = 400, description = "A slot ends before it starts"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Teachers"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn update_availability(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<TeacherId>,
    ValidatedJson(dto): ValidatedJson<UpdateAvailabilityDto>,
) -> Result<Json<ApiResponse<Vec<AvailabilitySlot>>>, AppError> {
    let slots =
        TeacherService::set_availability(&state.db, &auth_user.actor(), id, dto.availability)
            .await?;
    Ok(Json(ApiResponse::with_message(slots, "Availability updated")))
}
