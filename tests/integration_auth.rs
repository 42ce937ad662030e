mod common;

use axum::http::{StatusCode, header};
use campus::router::init_router;
use campus::state::AppState;
use campus_config::{RateBudget, RateLimitConfig};
use campus_core::Role;
use common::{PASSWORD, build_request, create_test_user, send, setup_test_app};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

#[sqlx::test(migrations = "./migrations")]
async fn test_login_returns_bearer_token(pool: PgPool) {
    let user = create_test_user(&pool, Role::Teacher).await;
    let app = setup_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "teacher");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let token = body["data"]["access_token"].as_str().unwrap();
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], user.email);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_with_wrong_password_is_unauthorized(pool: PgPool) {
    let user = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": "not-the-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_deactivated_user_cannot_log_in(pool: PgPool) {
    let user = create_test_user(&pool, Role::Student).await;
    sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_missing_or_invalid_token_is_unauthorized(pool: PgPool) {
    let app = setup_test_app(pool.clone());

    let (status, _) = send(&app, "GET", "/api/courses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/courses", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_user_administration_is_admin_only(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let teacher = create_test_user(&pool, Role::Teacher).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(&app, "GET", "/api/users", Some(&teacher.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/users", Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["total"], 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_only_admin_registers_users(pool: PgPool) {
    let admin = create_test_user(&pool, Role::Admin).await;
    let student = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());
    let payload = json!({
        "full_name": "New Teacher",
        "email": common::generate_unique_email(),
        "password": "newpass1234",
        "role": "teacher"
    });

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        Some(&student.token),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        Some(&admin.token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "teacher");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unknown_route_uses_error_envelope(pool: PgPool) {
    let app = setup_test_app(pool.clone());

    let (status, body) = send(&app, "GET", "/api/does-not-exist", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Route not found");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_auth_budget_exhaustion_returns_retry_after(pool: PgPool) {
    dotenvy::dotenv().ok();
    let limits = RateLimitConfig {
        auth: RateBudget::new(2, 900),
        ..common::relaxed_rate_limits()
    };
    let app = init_router(AppState::from_env(pool.clone()).with_rate_limits(&limits));
    let login = || {
        build_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "password123" })),
        )
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(login()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.clone().oneshot(login()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    // Other budgets are tracked separately.
    let (status, _) = send(&app, "GET", "/api/courses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_forwarded_for_header_does_not_reset_auth_budget(pool: PgPool) {
    dotenvy::dotenv().ok();
    let limits = RateLimitConfig {
        auth: RateBudget::new(2, 900),
        ..common::relaxed_rate_limits()
    };
    let app = init_router(AppState::from_env(pool.clone()).with_rate_limits(&limits));

    let mut statuses = Vec::new();
    for i in 0..5 {
        let mut request = build_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "password123" })),
        );
        request.headers_mut().insert(
            "x-forwarded-for",
            format!("10.9.0.{i}").parse().unwrap(),
        );
        statuses.push(app.clone().oneshot(request).await.unwrap().status());
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}
