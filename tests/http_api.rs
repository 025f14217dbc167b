use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use duo_cards_back::{
    build_router, config::AppConfig, dao::record_store::memory::MemoryRecordStore,
    state::AppState,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    let config = AppConfig {
        rng_seed: Some(9),
        ..AppConfig::default()
    };
    build_router(AppState::new(Arc::new(MemoryRecordStore::new()), config))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn full_round_over_http() {
    let app = app();
    let category = Uuid::new_v4();
    let (owner, guest) = (Uuid::new_v4(), Uuid::new_v4());

    for text in ["Favourite meal?", "Best trip?"] {
        let (status, _) = call(
            &app,
            "POST",
            "/questions",
            Some(json!({ "category_id": category, "language": "en", "text": text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, room) = call(
        &app,
        "POST",
        "/rooms",
        Some(json!({ "owner_id": owner, "language": "en", "category_ids": [category] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(room["status"], json!("waiting"));
    let room_id = room["id"].as_str().unwrap().to_owned();

    let (status, joined) = call(
        &app,
        "POST",
        &format!("/rooms/{room_id}/join"),
        Some(json!({ "guest_id": guest })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["room"]["status"], json!("ready"));

    let (status, started) = call(&app, "POST", &format!("/rooms/{room_id}/start"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["room"]["status"], json!("playing"));
    assert_eq!(started["draw"]["index"], json!(1));
    let holder = started["room"]["current_turn"].clone();

    let (status, answer) = call(
        &app,
        "POST",
        &format!("/rooms/{room_id}/answers"),
        Some(json!({ "user_id": holder, "action": "passed", "body": "skip" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(answer["body"], json!(""));

    let (status, turn) = call(
        &app,
        "POST",
        &format!("/rooms/{room_id}/turn"),
        Some(json!({ "from": holder })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(turn["applied"], json!(true));
    assert_ne!(turn["room"]["current_turn"], holder);

    let (status, answers) = call(&app, "GET", &format!("/rooms/{room_id}/answers"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answers["count"], json!(1));

    let (status, timeout) = call(
        &app,
        "POST",
        &format!("/rooms/{room_id}/timeout-check"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeout["outcome"], json!("not_paused"));
    assert_eq!(timeout["limit_secs"], json!(300));

    let (status, ended) = call(&app, "POST", &format!("/rooms/{room_id}/end"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["room"]["status"], json!("finished"));
}

#[tokio::test]
async fn errors_map_to_distinct_statuses() {
    let app = app();
    let owner = Uuid::new_v4();

    let (status, body) = call(&app, "GET", &format!("/rooms/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("not found"));

    let (status, _) = call(
        &app,
        "POST",
        "/rooms",
        Some(json!({ "owner_id": owner, "language": "English" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No question in the catalog: the start is refused and the room keeps waiting.
    let (_, room) = call(
        &app,
        "POST",
        "/rooms",
        Some(json!({ "owner_id": owner, "language": "en" })),
    )
    .await;
    let room_id = room["id"].as_str().unwrap().to_owned();
    let (status, body) = call(&app, "POST", &format!("/rooms/{room_id}/start"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(
        body["message"].as_str().unwrap().contains("no questions left"),
        "{body}"
    );
    let (_, room) = call(&app, "GET", &format!("/rooms/{room_id}"), None).await;
    assert_eq!(room["status"], json!("waiting"));

    let (status, _) = call(
        &app,
        "POST",
        &format!("/rooms/{room_id}/answers"),
        Some(json!({ "user_id": owner, "action": "shrugged", "body": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn healthcheck_reports_ok_for_memory_store() {
    let app = app();
    let (status, body) = call(&app, "GET", "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn user_stream_opens_an_event_stream() {
    let app = app();
    let request = Request::builder()
        .uri(format!("/sse/users/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");
}
