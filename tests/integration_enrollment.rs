mod common;

use axum::http::StatusCode;
use campus::modules::courses::enrollment::EnrollmentService;
use campus::modules::notifications::hub::NotificationHub;
use campus_core::{Actor, Role};
use common::{
    active_roster_count, create_test_course, create_test_student, create_test_teacher,
    create_test_user, send, setup_test_app,
};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_enroll_and_withdraw_updates_both_sides(pool: PgPool) {
    let (_, teacher_id) = create_test_teacher(&pool).await;
    let course_id = create_test_course(&pool, Some(teacher_id), "open_enrollment", 3).await;
    let (student, student_id) = create_test_student(&pool).await;
    let app = setup_test_app(pool.clone());

    let uri = format!("/api/courses/{course_id}/enroll");
    let (status, body) = send(&app, "POST", &uri, Some(&student.token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["available_seats"], 2);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/students/{student_id}/courses"),
        Some(&student.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["course_id"], course_id.to_string());

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/withdraw"),
        Some(&student.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "withdrawn");
    assert_eq!(body["data"]["available_seats"], 3);

    let mirrored: String = sqlx::query_scalar(
        "SELECT status::text FROM student_enrollments WHERE course_id = $1 AND student_id = $2",
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(mirrored, "withdrawn");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_enrollment_conflicts(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 5).await;
    let (student, _) = create_test_student(&pool).await;
    let app = setup_test_app(pool.clone());
    let uri = format!("/api/courses/{course_id}/enroll");

    let (status, _) = send(&app, "POST", &uri, Some(&student.token), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", &uri, Some(&student.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(active_roster_count(&pool, course_id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_full_course_rejects_enrollment(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 1).await;
    let (first, _) = create_test_student(&pool).await;
    let (second, _) = create_test_student(&pool).await;
    let app = setup_test_app(pool.clone());
    let uri = format!("/api/courses/{course_id}/enroll");

    let (status, _) = send(&app, "POST", &uri, Some(&first.token), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", &uri, Some(&second.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Course is full");

    let course_uri = format!("/api/courses/{course_id}");
    let (status, body) = send(&app, "GET", &course_uri, Some(&second.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_seats"], 0);

    // The seat frees up once the first student withdraws.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/withdraw"),
        Some(&first.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_seats"], 1);

    let (status, body) = send(&app, "POST", &uri, Some(&second.token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["available_seats"], 0);
    assert_eq!(active_roster_count(&pool, course_id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_zero_capacity_course_is_full(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 0).await;
    let (student, _) = create_test_student(&pool).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/enroll"),
        Some(&student.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_enrollment_requires_open_course(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "planning", 10).await;
    let (student, _) = create_test_student(&pool).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/enroll"),
        Some(&student.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_student_cannot_enroll_someone_else(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 10).await;
    let (student, _) = create_test_student(&pool).await;
    let (_, other_id) = create_test_student(&pool).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/enroll"),
        Some(&student.token),
        Some(json!({ "student_id": other_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(active_roster_count(&pool, course_id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_admin_enrolls_named_student_and_teacher_cannot(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 10).await;
    let (_, student_id) = create_test_student(&pool).await;
    let admin = create_test_user(&pool, Role::Admin).await;
    let (teacher, _) = create_test_teacher(&pool).await;
    let app = setup_test_app(pool.clone());
    let uri = format!("/api/courses/{course_id}/enroll");

    let (status, _) = send(&app, "POST", &uri, Some(&teacher.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&admin.token),
        Some(json!({ "student_id": student_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_enrollments_take_only_the_last_seat(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 1).await;
    let admin = create_test_user(&pool, Role::Admin).await;
    let actor = Actor::new(admin.id, Role::Admin);
    let hub = NotificationHub::new();

    let mut students = Vec::new();
    for _ in 0..5 {
        students.push(create_test_student(&pool).await.1);
    }

    let handles: Vec<_> = students
        .into_iter()
        .map(|student_id| {
            let pool = pool.clone();
            let hub = hub.clone();
            tokio::spawn(async move {
                EnrollmentService::enroll(&pool, &hub, &actor, course_id, student_id).await
            })
        })
        .collect();

    let mut enrolled = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => enrolled += 1,
            Err(err) => {
                assert_eq!(err.status, StatusCode::CONFLICT);
                full += 1;
            }
        }
    }

    assert_eq!(enrolled, 1);
    assert_eq!(full, 4);
    assert_eq!(active_roster_count(&pool, course_id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_aborted_withdrawal_leaves_enrollment_intact(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 10).await;
    let (_, student_id) = create_test_student(&pool).await;
    let admin = create_test_user(&pool, Role::Admin).await;
    let actor = Actor::new(admin.id, Role::Admin);

    EnrollmentService::enroll(&pool, &NotificationHub::new(), &actor, course_id, student_id)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let outcome = EnrollmentService::withdraw_in(&mut tx, &actor, course_id, student_id)
        .await
        .unwrap();
    assert_eq!(outcome.result.available_seats, 10);
    tx.rollback().await.unwrap();

    assert_eq!(active_roster_count(&pool, course_id).await, 1);
    let mirrored: String = sqlx::query_scalar(
        "SELECT status::text FROM student_enrollments WHERE course_id = $1 AND student_id = $2",
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(mirrored, "active");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_withdraw_without_enrollment_is_not_found(pool: PgPool) {
    let course_id = create_test_course(&pool, None, "open_enrollment", 10).await;
    let (student, _) = create_test_student(&pool).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/withdraw"),
        Some(&student.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
