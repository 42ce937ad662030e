use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError, Paginated};
use campus_models::ids::{CourseId, MaterialId};
use tracing::instrument;

use super::enrollment::EnrollmentService;
use super::model::{
    Course, CourseDetail, CourseFilterParams, CourseMaterial, CreateCourseDto, CreateMaterialDto,
    EnrollmentRequest, EnrollmentResult, RosterEntry, RosterFilterParams, UpdateCourseDto,
};
use super::service::CourseService;
use crate::middleware::auth::AuthUser;
use crate::middleware::role::RequireAdmin;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// List courses
#[utoipa::path(
    get,
    path = "/api/courses",
    params(CourseFilterParams),
    responses(
        (status = 200, description = "Paginated courses", body = ApiResponse<Paginated<Course>>),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_courses(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(filters): Query<CourseFilterParams>,
) -> Result<Json<ApiResponse<Paginated<Course>>>, AppError> {
    let courses = CourseService::get_courses(&state.db, filters).await?;
    Ok(Json(ApiResponse::success(courses)))
}

/// Create a course
#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CreateCourseDto,
    responses(
        (status = 201, description = "Course created", body = ApiResponse<Course>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Teacher not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, dto))]
pub async fn create_course(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateCourseDto>,
) -> Result<(StatusCode, Json<ApiResponse<Course>>), AppError> {
    let course = CourseService::create_course(&state.db, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(course, "Course created")),
    ))
}

/// Get a course with its teacher and materials
#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(("id" = CourseId, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course detail", body = ApiResponse<CourseDetail>),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_course(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<CourseId>,
) -> Result<Json<ApiResponse<CourseDetail>>, AppError> {
    let course = CourseService::get_course(&state.db, id).await?;
    Ok(Json(ApiResponse::success(course)))
}

/// Update a course
#[utoipa::path(
    put,
    path = "/api/courses/{id}",
    params(("id" = CourseId, Path, description = "Course ID")),
    request_body = UpdateCourseDto,
    responses(
        (status = 200, description = "Course updated", body = ApiResponse<Course>),
        (status = 400, description = "Invalid dates or capacity below active enrollments"),
        (status = 403, description = "Not an admin or the course teacher"),
        (status = 404, description = "Course or teacher not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn update_course(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<CourseId>,
    ValidatedJson(dto): ValidatedJson<UpdateCourseDto>,
) -> Result<Json<ApiResponse<Course>>, AppError> {
    let course = CourseService::update_course(&state.db, &auth_user.actor(), id, dto).await?;
    Ok(Json(ApiResponse::with_message(course, "Course updated")))
}

/// Delete a course
#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    params(("id" = CourseId, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 400, description = "Course is active with enrolled students"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state))]
pub async fn delete_course(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CourseId>,
) -> Result<StatusCode, AppError> {
    CourseService::delete_course(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Enroll a student
#[utoipa::path(
    post,
    path = "/api/courses/{id}/enroll",
    params(("id" = CourseId, Path, description = "Course ID")),
    request_body = EnrollmentRequest,
    responses(
        (status = 201, description = "Enrolled", body = ApiResponse<EnrollmentResult>),
        (status = 400, description = "Course not open for enrollment"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Course or student not found"),
        (status = 409, description = "Already enrolled or course full"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, auth_user, request), fields(user.id = %auth_user.user_id))]
pub async fn enroll(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<CourseId>,
    request: Option<Json<EnrollmentRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<EnrollmentResult>>), AppError> {
    let actor = auth_user.actor();
    let requested = request.and_then(|Json(r)| r.student_id);
    let student_id = EnrollmentService::resolve_student(&state.db, &actor, requested).await?;

    let result = EnrollmentService::enroll(&state.db, &state.hub, &actor, id, student_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(result, "Enrolled successfully")),
    ))
}

/// Withdraw a student
#[utoipa::path(
    post,
    path = "/api/courses/{id}/withdraw",
    params(("id" = CourseId, Path, description = "Course ID")),
    request_body = EnrollmentRequest,
    responses(
        (status = 200, description = "Withdrawn", body = ApiResponse<EnrollmentResult>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No active enrollment"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, auth_user, request), fields(user.id = %auth_user.user_id))]
pub async fn withdraw(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<CourseId>,
    request: Option<Json<EnrollmentRequest>>,
) -> Result<Json<ApiResponse<EnrollmentResult>>, AppError> {
    let actor = auth_user.actor();
    let requested = request.and_then(|Json(r)| r.student_id);
    let student_id = EnrollmentService::resolve_student(&state.db, &actor, requested).await?;

    let result =
        EnrollmentService::withdraw(&state.db, &state.hub, &actor, id, student_id).await?;
    Ok(Json(ApiResponse::with_message(result, "Withdrawn successfully")))
}

/// Course roster
#[utoipa::path(
    get,
    path = "/api/courses/{id}/students",
    params(("id" = CourseId, Path, description = "Course ID"), RosterFilterParams),
    responses(
        (status = 200, description = "Roster", body = ApiResponse<Vec<RosterEntry>>),
        (status = 403, description = "Not an admin or the course teacher"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_course_students(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<CourseId>,
    Query(params): Query<RosterFilterParams>,
) -> Result<Json<ApiResponse<Vec<RosterEntry>>>, AppError> {
    let roster = CourseService::get_roster(&state.db, &auth_user.actor(), id, params).await?;
    Ok(Json(ApiResponse::success(roster)))
}

/// Attach a material to a course
#[utoipa::path(
    post,
    path = "/api/courses/{id}/materials",
    params(("id" = CourseId, Path, description = "Course ID")),
    request_body = CreateMaterialDto,
    responses(
        (status = 201, description = "Material added", body = ApiResponse<CourseMaterial>),
        (status = 403, description = "Not an admin or the course teacher"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn add_material(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<CourseId>,
    ValidatedJson(dto): ValidatedJson<CreateMaterialDto>,
) -> Result<(StatusCode, Json<ApiResponse<CourseMaterial>>), AppError> {
    let material = CourseService::add_material(&state.db, &auth_user.actor(), id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(material, "Material added")),
    ))
}

/// Remove a course material
#[utoipa::path(
    delete,
    path = "/api/courses/{id}/materials/{material_id}",
    params(
        ("id" = CourseId, Path, description = "Course ID"),
        ("material_id" = MaterialId, Path, description = "Material ID")
    ),
    responses(
        (status = 204, description = "Material removed"),
        (status = 403, description = "Not an admin or the course teacher"),
        (status = 404, description = "Course or material not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_material(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, material_id)): Path<(CourseId, MaterialId)>,
) -> Result<StatusCode, AppError> {
    CourseService::delete_material(&state.db, &auth_user.actor(), id, material_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
