/// Route-level tests: drive the router in-process with `tower::ServiceExt::oneshot`
/// and check status codes and JSON shapes.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header::CONTENT_TYPE};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use textlinker_api::{AppState, router};
use textlinker_relay::{RelayConfig, RelayService};

fn app() -> Router {
    router(AppState::new(RelayService::new(RelayConfig::default())))
}

async fn send_raw(app: &Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(raw) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(raw)
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_raw(app, Method::POST, uri, Some(body.to_string())).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send_raw(app, Method::GET, uri, None).await
}

#[tokio::test]
async fn web_upload_is_read_once() {
    let app = app();
    let (status, body) = post(&app, "/upload", json!({"token": "abc123", "text": "hello", "origin": "web"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (status, body) = get(&app, "/text/abc123/unread-web").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], json!("hello"));
    assert!(messages[0]["id"].is_string());
    assert!(messages[0]["created_at"].as_str().unwrap().parse::<chrono::DateTime<chrono::Utc>>().is_ok());

    let (_, body) = get(&app, "/text/abc123/unread-web").await;
    assert_eq!(body, json!({"ok": true, "messages": []}));
}

#[tokio::test]
async fn app_uploads_stay_out_of_unread_web() {
    let app = app();
    post(&app, "/upload", json!({"token": "tok-app", "text": "mine"})).await;
    post(&app, "/upload-web", json!({"token": "tok-app", "text": "theirs", "origin": "app"})).await;

    let (_, body) = get(&app, "/text/tok-app/unread-web").await;
    let texts: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["theirs"]);

    // Legacy read still sees the latest, consumed or not.
    let (status, body) = get(&app, "/text/tok-app").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"text": "theirs"}));
}

#[tokio::test]
async fn legacy_read_of_unknown_token_is_404() {
    let app = app();
    let (status, body) = get(&app, "/text/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"ok": false, "error": "No text found"}));
}

#[tokio::test]
async fn upload_size_boundary() {
    let app = app();
    let (status, body) = post(&app, "/upload", json!({"token": "big", "text": "x".repeat(200_000)})).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["ok"], json!(false));

    let (status, _) = post(&app, "/upload", json!({"token": "big", "text": "x".repeat(199_999)})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_upload_bodies_are_400() {
    let app = app();
    for body in [
        json!({"text": "no token"}),
        json!({"token": "", "text": "empty token"}),
        json!({"token": "tok"}),
        json!({"token": "tok", "text": ""}),
        json!({"token": 42, "text": "numeric token"}),
    ] {
        let (status, resp) = post(&app, "/upload", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["ok"], json!(false));
        assert!(resp["error"].is_string());
    }

    let (status, resp) = send_raw(&app, Method::POST, "/upload", Some("{not json".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["ok"], json!(false));
}

#[tokio::test]
async fn chunked_upload_scenario() {
    let app = app();
    let (status, body) = post(
        &app,
        "/upload-chunk",
        json!({"token": "t1", "chunkIndex": 0, "totalChunks": 2, "textChunk": "foo"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "receivedIndex": 0}));

    let (status, body) = post(
        &app,
        "/upload-chunk",
        json!({"token": "t1", "chunkIndex": 1, "totalChunks": 2, "textChunk": "bar"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "receivedIndex": 1, "assembled": true}));

    let (_, body) = get(&app, "/text/t1").await;
    assert_eq!(body, json!({"text": "foobar"}));
}

#[tokio::test]
async fn chunk_with_web_origin_is_unread_web() {
    let app = app();
    post(
        &app,
        "/upload-chunk",
        json!({"token": "t2", "chunkIndex": 0, "totalChunks": 1, "textChunk": "solo", "origin": "web"}),
    )
    .await;
    let (_, body) = get(&app, "/text/t2/unread-web").await;
    assert_eq!(body["messages"][0]["text"], json!("solo"));
}

#[tokio::test]
async fn chunk_errors() {
    let app = app();
    post(
        &app,
        "/upload-chunk",
        json!({"token": "t3", "chunkIndex": 0, "totalChunks": 3, "textChunk": "a"}),
    )
    .await;

    let (status, body) = post(
        &app,
        "/upload-chunk",
        json!({"token": "t3", "chunkIndex": 1, "totalChunks": 4, "textChunk": "b"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("totalChunks mismatch with existing assembly"));

    let (status, _) = post(
        &app,
        "/upload-chunk",
        json!({"token": "t3", "chunkIndex": 3, "totalChunks": 3, "textChunk": "c"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/upload-chunk", json!({"token": "t3", "chunkIndex": 1, "totalChunks": 3})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        "/upload-chunk",
        json!({"token": "t3", "chunkIndex": "1", "totalChunks": 3, "textChunk": "c"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_token_and_health() {
    let app = app();
    let (status, body) = get(&app, "/generate-token").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 32);

    post(&app, "/upload", json!({"token": token, "text": "hi"})).await;
    post(
        &app,
        "/upload-chunk",
        json!({"token": "pending", "chunkIndex": 0, "totalChunks": 2, "textChunk": "x"}),
    )
    .await;

    let (_, body) = get(&app, "/health").await;
    assert_eq!(
        body,
        json!({"ok": true, "tokens": 1, "messages": 1, "pending_assemblies": 1})
    );
}

#[tokio::test]
async fn oversized_chunk_assembly_is_413() {
    let app = app();
    let part = "x".repeat(100_000);
    let (status, _) = post(
        &app,
        "/upload-chunk",
        json!({"token": "flood", "chunkIndex": 0, "totalChunks": 1000, "textChunk": part}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        "/upload-chunk",
        json!({"token": "flood", "chunkIndex": 1, "totalChunks": 1000, "textChunk": part}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["ok"], json!(false));

    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["pending_assemblies"], json!(0));
}
