#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use campus::router::init_router;
use campus::state::AppState;
use campus_auth::create_access_token;
use campus_config::{JwtConfig, RateBudget, RateLimitConfig};
use campus_core::{Role, hash_password};
use campus_models::{CourseId, StudentId, TeacherId};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "testpass123";

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
}

/// Limits high enough that no test trips them by accident.
pub fn relaxed_rate_limits() -> RateLimitConfig {
    RateLimitConfig {
        auth: RateBudget::new(1000, 60),
        api: RateBudget::new(1000, 60),
        admin: RateBudget::new(1000, 60),
        trust_proxy: false,
    }
}

pub fn test_state(pool: PgPool) -> AppState {
    dotenvy::dotenv().ok();
    AppState::from_env(pool).with_rate_limits(&relaxed_rate_limits())
}

pub fn setup_test_app(pool: PgPool) -> Router {
    init_router(test_state(pool))
}

pub fn generate_unique_email() -> String {
    format!("test-{}@test.com", Uuid::new_v4())
}

pub fn generate_enrollment_number() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_uppercase()
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> TestUser {
    let email = generate_unique_email();
    let hashed = hash_password(PASSWORD).unwrap();

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (full_name, email, password_hash, role)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(format!("Test {}", role.as_str()))
    .bind(&email)
    .bind(&hashed)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();

    let token = create_access_token(id, &email, role, &JwtConfig::from_env()).unwrap();

    TestUser {
        id,
        email,
        role,
        token,
    }
}

pub async fn create_test_student(pool: &PgPool) -> (TestUser, StudentId) {
    let user = create_test_user(pool, Role::Student).await;
    let student_id: StudentId = sqlx::query_scalar(
        "INSERT INTO students (user_id, enrollment_number) VALUES ($1, $2) RETURNING id",
    )
    .bind(user.id)
    .bind(generate_enrollment_number())
    .fetch_one(pool)
    .await
    .unwrap();
    (user, student_id)
}

pub async fn create_test_teacher(pool: &PgPool) -> (TestUser, TeacherId) {
    let user = create_test_user(pool, Role::Teacher).await;
    let teacher_id: TeacherId = sqlx::query_scalar(
        "INSERT INTO teachers (user_id, specialty) VALUES ($1, 'Mathematics') RETURNING id",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await
    .unwrap();
    (user, teacher_id)
}

/// `status` is the `course_status` label, e.g. `open_enrollment`.
pub async fn create_test_course(
    pool: &PgPool,
    teacher_id: Option<TeacherId>,
    status: &str,
    capacity: i32,
) -> CourseId {
    let course_id: CourseId = sqlx::query_scalar(
        "INSERT INTO courses (name, teacher_id, total_hours, start_date, end_date, status, capacity)
         VALUES ($1, $2, 40, CURRENT_DATE, CURRENT_DATE + 90, $3::course_status, $4)
         RETURNING id",
    )
    .bind(format!("Course {}", Uuid::new_v4()))
    .bind(teacher_id)
    .bind(status)
    .bind(capacity)
    .fetch_one(pool)
    .await
    .unwrap();

    if let Some(teacher_id) = teacher_id {
        sqlx::query("INSERT INTO teacher_courses (teacher_id, course_id) VALUES ($1, $2)")
            .bind(teacher_id)
            .bind(course_id)
            .execute(pool)
            .await
            .unwrap();
    }
    course_id
}

/// Active enrollment written to both the roster and the student's list.
pub async fn enroll_directly(pool: &PgPool, course_id: CourseId, student_id: StudentId) {
    sqlx::query("INSERT INTO course_roster (course_id, student_id) VALUES ($1, $2)")
        .bind(course_id)
        .bind(student_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO student_enrollments (course_id, student_id) VALUES ($1, $2)")
        .bind(course_id)
        .bind(student_id)
        .execute(pool)
        .await
        .unwrap();
}

pub fn build_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends one request and returns the status with the parsed JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(build_request(method, uri, token, body))
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub async fn active_roster_count(pool: &PgPool, course_id: CourseId) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM course_roster WHERE course_id = $1 AND status = 'active'",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await
    .unwrap()
}
