mod common;

use axum::http::StatusCode;
use campus_core::Role;
use common::{create_test_course, create_test_user, send, setup_test_app};
use serde_json::{Value, json};
use sqlx::PgPool;

fn event_payload(title: &str) -> Value {
    json!({
        "title": title,
        "start_at": "2026-03-01T09:00:00Z",
        "end_at": "2026-03-01T11:00:00Z",
        "kind": "exam"
    })
}

#[sqlx::test(migrations = "./migrations")]
async fn test_calendar_event_ownership(pool: PgPool) {
    let owner = create_test_user(&pool, Role::Teacher).await;
    let other = create_test_user(&pool, Role::Teacher).await;
    let admin = create_test_user(&pool, Role::Admin).await;
    let student = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        "/api/calendar",
        Some(&student.token),
        Some(event_payload("Student event")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/calendar",
        Some(&owner.token),
        Some(event_payload("Midterm exam")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["color"], "#3788d8");
    let uri = format!("/api/calendar/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&student.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&other.token),
        Some(json!({ "title": "Taken over" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(&owner.token),
        Some(json!({ "title": "Midterm exam (room 4)" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Midterm exam (room 4)");

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &uri, Some(&owner.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_calendar_event_rejects_inverted_range_and_unknown_course(pool: PgPool) {
    let teacher = create_test_user(&pool, Role::Teacher).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        "/api/calendar",
        Some(&teacher.token),
        Some(json!({
            "title": "Backwards",
            "start_at": "2026-03-01T11:00:00Z",
            "end_at": "2026-03-01T09:00:00Z",
            "kind": "class"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut payload = event_payload("Ghost course");
    payload["course_ids"] = json!([uuid::Uuid::new_v4()]);
    let (status, _) = send(
        &app,
        "POST",
        "/api/calendar",
        Some(&teacher.token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_course_events_are_listed_per_course(pool: PgPool) {
    let teacher = create_test_user(&pool, Role::Teacher).await;
    let course_id = create_test_course(&pool, None, "active", 10).await;
    let app = setup_test_app(pool.clone());

    let mut payload = event_payload("Lab session");
    payload["course_ids"] = json!([course_id]);
    let (status, _) = send(
        &app,
        "POST",
        "/api/calendar",
        Some(&teacher.token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/calendar/course/{course_id}"),
        Some(&teacher.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_report_visibility_follows_grants(pool: PgPool) {
    let author = create_test_user(&pool, Role::Teacher).await;
    let colleague = create_test_user(&pool, Role::Teacher).await;
    let admin = create_test_user(&pool, Role::Admin).await;
    let student = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        "/api/reports",
        Some(&student.token),
        Some(json!({ "title": "Sneaky", "kind": "administrative" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/reports",
        Some(&author.token),
        Some(json!({ "title": "Term overview", "kind": "administrative" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "done");
    assert_eq!(body["data"]["payload"]["kind"], "administrative");
    let private_uri = format!("/api/reports/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &private_uri, Some(&colleague.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", &private_uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/api/reports",
        Some(&author.token),
        Some(json!({
            "title": "Shared overview",
            "kind": "custom",
            "parameters": { "note": "for the department" },
            "access_grants": [{ "kind": "role", "role": "teacher" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let shared_uri = format!("/api/reports/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &shared_uri, Some(&colleague.token), None).await;
    assert_eq!(status, StatusCode::OK);

    // A grant gives read access only.
    let (status, _) = send(&app, "DELETE", &shared_uri, Some(&colleague.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/reports", Some(&colleague.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["total"], 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_financial_report_is_stored_as_error(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let app = setup_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/reports",
        Some(&admin.token),
        Some(json!({ "title": "Budget", "kind": "financial" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "error");
    assert!(body["data"]["payload"]["error"].is_string());
}
