mod common;

use axum::http::StatusCode;
use campus_core::Role;
use common::{create_test_user, send, setup_test_app};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_direct_conversation_is_deduplicated(pool: PgPool) {
    let alice = create_test_user(&pool, Role::Teacher).await;
    let bob = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/conversations",
        Some(&alice.token),
        Some(json!({ "kind": "direct", "participant_ids": [bob.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let conversation_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 2);

    // Same pair from the other side resolves to the existing conversation.
    let (status, body) = send(
        &app,
        "POST",
        "/api/conversations",
        Some(&bob.token),
        Some(json!({ "kind": "direct", "participant_ids": [alice.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], conversation_id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE kind = 'direct'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_direct_conversation_needs_exactly_one_other_participant(pool: PgPool) {
    let alice = create_test_user(&pool, Role::Teacher).await;
    let bob = create_test_user(&pool, Role::Student).await;
    let carol = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());

    let (status, _) = send(
        &app,
        "POST",
        "/api/conversations",
        Some(&alice.token),
        Some(json!({ "kind": "direct", "participant_ids": [bob.id, carol.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_messages_flow_and_participant_gate(pool: PgPool) {
    let alice = create_test_user(&pool, Role::Teacher).await;
    let bob = create_test_user(&pool, Role::Student).await;
    let outsider = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());

    let (_, body) = send(
        &app,
        "POST",
        "/api/conversations",
        Some(&alice.token),
        Some(json!({
            "kind": "group",
            "title": "Study group",
            "participant_ids": [bob.id],
            "initial_message": "Welcome"
        })),
    )
    .await;
    let conversation_id = body["data"]["id"].as_str().unwrap().to_string();
    let messages_uri = format!("/api/conversations/{conversation_id}/messages");

    let (status, body) = send(
        &app,
        "POST",
        &messages_uri,
        Some(&bob.token),
        Some(json!({ "content": "Hello everyone" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["content"], "Hello everyone");

    let (status, body) = send(&app, "GET", &messages_uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["content"], "Welcome");
    assert_eq!(items[1]["content"], "Hello everyone");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/conversations/{conversation_id}"),
        Some(&alice.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["last_message_content"], "Hello everyone");

    let (status, _) = send(&app, "GET", &messages_uri, Some(&outsider.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        &messages_uri,
        Some(&outsider.token),
        Some(json!({ "content": "Let me in" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_only_conversation_admin_adds_participants(pool: PgPool) {
    let alice = create_test_user(&pool, Role::Teacher).await;
    let bob = create_test_user(&pool, Role::Student).await;
    let carol = create_test_user(&pool, Role::Student).await;
    let app = setup_test_app(pool.clone());

    let (_, body) = send(
        &app,
        "POST",
        "/api/conversations",
        Some(&alice.token),
        Some(json!({ "kind": "group", "title": "Lab", "participant_ids": [bob.id] })),
    )
    .await;
    let conversation_id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/conversations/{conversation_id}/participants");

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&bob.token),
        Some(json!({ "user_ids": [carol.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(&alice.token),
        Some(json!({ "user_ids": [carol.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 3);
}
