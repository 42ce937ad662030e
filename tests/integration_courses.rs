mod common;

use axum::http::StatusCode;
use campus_core::Role;
use campus_models::CourseId;
use common::{
    active_roster_count, create_test_course, create_test_student, create_test_teacher,
    create_test_user, enroll_directly, send, setup_test_app,
};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_admin_creates_course_with_teacher_assignment(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let (_, teacher_id) = create_test_teacher(&pool).await;
    let app = setup_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/courses",
        Some(&admin.token),
        Some(json!({
            "name": "Linear Algebra",
            "teacher_id": teacher_id,
            "total_hours": 60,
            "start_date": "2026-01-10",
            "end_date": "2026-05-30",
            "capacity": 25,
            "categories": ["math"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "planning");
    assert_eq!(body["data"]["available_seats"], 25);

    let assigned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM teacher_courses WHERE teacher_id = $1)",
    )
    .bind(teacher_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(assigned);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_create_course_rejects_inverted_dates(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let (_, teacher_id) = create_test_teacher(&pool).await;
    let app = setup_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/courses",
        Some(&admin.token),
        Some(json!({
            "name": "Backwards",
            "teacher_id": teacher_id,
            "total_hours": 10,
            "start_date": "2026-05-30",
            "end_date": "2026-01-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_teacher_cannot_create_course(pool: PgPool) {
    let (teacher, teacher_id) = create_test_teacher(&pool).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        "/api/courses",
        Some(&teacher.token),
        Some(json!({
            "name": "Unauthorised",
            "teacher_id": teacher_id,
            "total_hours": 10,
            "start_date": "2026-01-10",
            "end_date": "2026-02-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

async fn course_exists(pool: &PgPool, course_id: CourseId) -> bool {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)")
        .bind(course_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cancelled_course_can_be_deleted_after_rejection(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let course_id = create_test_course(&pool, None, "active", 10).await;
    let (_, student_id) = create_test_student(&pool).await;
    enroll_directly(&pool, course_id, student_id).await;
    let app = setup_test_app(pool.clone());
    let uri = format!("/api/courses/{course_id}");

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(course_exists(&pool, course_id).await);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin.token),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!course_exists(&pool, course_id).await);

    let enrollments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM student_enrollments WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(enrollments, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_active_course_can_be_deleted_once_roster_is_empty(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let course_id = create_test_course(&pool, None, "active", 10).await;
    let (_, student_id) = create_test_student(&pool).await;
    enroll_directly(&pool, course_id, student_id).await;
    let app = setup_test_app(pool.clone());
    let uri = format!("/api/courses/{course_id}");

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/withdraw"),
        Some(&admin.token),
        Some(json!({ "student_id": student_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active_roster_count(&pool, course_id).await, 0);

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!course_exists(&pool, course_id).await);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_course_cascades(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let (_, teacher_id) = create_test_teacher(&pool).await;
    let course_id = create_test_course(&pool, Some(teacher_id), "planning", 10).await;
    let app = setup_test_app(pool.clone());

    let uri = format!("/api/courses/{course_id}");
    let (status, body) = send(&app, "DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let assignments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM teacher_courses WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(assignments, 0);

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_only_assigned_teacher_updates_course(pool: PgPool) {
    let (owner, owner_id) = create_test_teacher(&pool).await;
    let (other, _) = create_test_teacher(&pool).await;
    let course_id = create_test_course(&pool, Some(owner_id), "planning", 10).await;
    let app = setup_test_app(pool.clone());
    let uri = format!("/api/courses/{course_id}");

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&other.token),
        Some(json!({ "description": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(&owner.token),
        Some(json!({ "description": "Updated syllabus" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "Updated syllabus");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_admin_reassigns_teacher_between_course_lists(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let (_, from_id) = create_test_teacher(&pool).await;
    let (_, to_id) = create_test_teacher(&pool).await;
    let course_id = create_test_course(&pool, Some(from_id), "planning", 10).await;
    let app = setup_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/courses/{course_id}"),
        Some(&admin.token),
        Some(json!({ "teacher_id": to_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["teacher_id"], to_id.to_string());

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/teachers/{from_id}/courses"),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/teachers/{to_id}/courses"),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let taught = body["data"].as_array().unwrap();
    assert_eq!(taught.len(), 1);
    assert_eq!(taught[0]["id"], course_id.to_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_course_teacher_cannot_reassign_course(pool: PgPool) {
    let (owner, owner_id) = create_test_teacher(&pool).await;
    let (_, other_id) = create_test_teacher(&pool).await;
    let course_id = create_test_course(&pool, Some(owner_id), "planning", 10).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/courses/{course_id}"),
        Some(&owner.token),
        Some(json!({ "teacher_id": other_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let assigned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM teacher_courses WHERE teacher_id = $1 AND course_id = $2)",
    )
    .bind(owner_id)
    .bind(course_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(assigned);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_capacity_cannot_drop_below_active_roster(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let course_id = create_test_course(&pool, None, "open_enrollment", 5).await;
    for _ in 0..2 {
        let (_, student_id) = create_test_student(&pool).await;
        enroll_directly(&pool, course_id, student_id).await;
    }
    let app = setup_test_app(pool.clone());
    let uri = format!("/api/courses/{course_id}");

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin.token),
        Some(json!({ "capacity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin.token),
        Some(json!({ "capacity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_seats"], 0);
}
