use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError, Paginated};
use campus_models::ids::StudentId;
use campus_models::progress::{ProgressParams, StudentAttendance, StudentGrade};
use tracing::instrument;

use super::model::{
    CreateStudentDto, Student, StudentCoursesParams, StudentDetail, StudentEnrollment,
    StudentFilterParams, UpdateStudentDto,
};
use super::service::StudentService;
use crate::middleware::auth::AuthUser;
use crate::middleware::role::{RequireAdmin, RequireStaff};
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// List students
#[utoipa::path(
    get,
    path = "/api/students",
    params(StudentFilterParams),
    responses(
        (status = 200, description = "Paginated students", body = ApiResponse<Paginated<Student>>),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Staff only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state))]
pub async fn get_students(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Query(filters): Query<StudentFilterParams>,
) -> Result<Json<ApiResponse<Paginated<Student>>>, AppError> {
    let students = StudentService::get_students(&state.db, filters).await?;
    Ok(Json(ApiResponse::success(students)))
}

/// Create a student with their identity
#[utoipa::path(
    post,
    path = "/api/students",
    request_body = CreateStudentDto,
    responses(
        (status = 201, description = "Student created", body = ApiResponse<Student>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email or enrollment number already in use"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state, dto))]
pub async fn create_student(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateStudentDto>,
) -> Result<(StatusCode, Json<ApiResponse<Student>>), AppError> {
    let student = StudentService::create_student(&state.db, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(student, "Student created")),
    ))
}

/// Get a student with enrollments and academic history
#[utoipa::path(
    get,
    path = "/api/students/{id}",
    params(("id" = StudentId, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student detail", body = ApiResponse<StudentDetail>),
        (status = 403, description = "Not staff and not this student"),
        (status = 404, description = "Student not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_student(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<StudentId>,
) -> Result<Json<ApiResponse<StudentDetail>>, AppError> {
    let student = StudentService::get_student(&state.db, &auth_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(student)))
}

/// Update a student
#[utoipa::path(
    put,
    path = "/api/students/{id}",
    params(("id" = StudentId, Path, description = "Student ID")),
    request_body = UpdateStudentDto,
    responses(
        (status = 200, description = "Student updated", body = ApiResponse<Student>),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Email or enrollment number already in use"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state, dto))]
pub async fn update_student(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<StudentId>,
    ValidatedJson(dto): ValidatedJson<UpdateStudentDto>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    let student = StudentService::update_student(&state.db, id, dto).await?;
    Ok(Json(ApiResponse::with_message(student, "Student updated")))
}

/// Delete a student profile and deactivate the identity
#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    params(("id" = StudentId, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 400, description = "Student has active enrollments"),
        (status = 404, description = "Student not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state))]
pub async fn delete_student(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<StudentId>,
) -> Result<StatusCode, AppError> {
    StudentService::delete_student(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A student's enrollments
#[utoipa::path(
    get,
    path = "/api/students/{id}/courses",
    params(
        ("id" = StudentId, Path, description = "Student ID"),
        StudentCoursesParams
    ),
    responses(
        (status = 200, description = "Enrollments", body = ApiResponse<Vec<StudentEnrollment>>),
        (status = 403, description = "Not staff and not this student"),
        (status = 404, description = "Student not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_student_courses(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<StudentId>,
    Query(params): Query<StudentCoursesParams>,
) -> Result<Json<ApiResponse<Vec<StudentEnrollment>>>, AppError> {
    let courses =
        StudentService::get_student_courses(&state.db, &auth_user.actor(), id, params).await?;
    Ok(Json(ApiResponse::success(courses)))
}

/// A student's assessment grades
#[utoipa::path(
    get,
    path = "/api/students/{id}/grades",
    params(
        ("id" = StudentId, Path, description = "Student ID"),
        ProgressParams
    ),
    responses(
        (status = 200, description = "Grades", body = ApiResponse<Vec<StudentGrade>>),
        (status = 403, description = "Not staff and not this student"),
        (status = 404, description = "Student not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_student_grades(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<StudentId>,
    Query(params): Query<ProgressParams>,
) -> Result<Json<ApiResponse<Vec<StudentGrade>>>, AppError> {
    let grades =
        StudentService::get_student_grades(&state.db, &auth_user.actor(), id, params).await?;
    Ok(Json(ApiResponse::success(grades)))
}

/// A student's lesson attendance
#[utoipa::path(
    get,
    path = "/api/students/{id}/attendance",
    params(
        ("id" = StudentId, Path, description = "Student ID"),
        ProgressParams
    ),
    responses(
        (status = 200, description = "Attendance records", body = ApiResponse<Vec<StudentAttendance>>),
        (status = 403, description = "Not staff and not this student"),
        (status = 404, description = "Student not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_student_attendance(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<StudentId>,
    Query(params): Query<ProgressParams>,
) -> Result<Json<ApiResponse<Vec<StudentAttendance>>>, AppError> {
    let attendance =
        StudentService::get_student_attendance(&state.db, &auth_user.actor(), id, params).await?;
    Ok(Json(ApiResponse::success(attendance)))
}
