use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use textlinker_api::{AppState, router};
use textlinker_client::combined::encode;
use textlinker_client::upload::STATE_COMPLETE;
use textlinker_client::{
    ClientError, Consumer, ConsumerPolicy, LocalItemStore, RefreshBlocked, RefreshOutcome,
    RelayClient,
};
use textlinker_relay::{RelayConfig, RelayService};
use textlinker_types::models::LocalItem;

#[derive(Default)]
struct MemoryItems {
    items: Mutex<Vec<LocalItem>>,
}

impl MemoryItems {
    fn with(contents: &[&str]) -> Self {
        let items = contents
            .iter()
            .map(|c| LocalItem {
                title: "note".into(),
                content: c.to_string(),
            })
            .collect();
        Self {
            items: Mutex::new(items),
        }
    }

    fn snapshot(&self) -> Vec<LocalItem> {
        self.items.lock().unwrap().clone()
    }
}

impl LocalItemStore for MemoryItems {
    type Error = Infallible;

    fn list_local_items(&self) -> Result<Vec<LocalItem>, Infallible> {
        Ok(self.snapshot())
    }

    fn save_item(&self, item: LocalItem) -> Result<(), Infallible> {
        self.items.lock().unwrap().push(item);
        Ok(())
    }
}

async fn serve(app: Router) -> (String, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind relay");
    let addr = listener.local_addr().expect("relay addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    (format!("http://{}", addr), shutdown_tx)
}

async fn start_relay() -> (String, oneshot::Sender<()>) {
    serve(router(AppState::new(RelayService::new(RelayConfig::default())))).await
}

fn quick_policy() -> ConsumerPolicy {
    ConsumerPolicy {
        refresh_cooldown: chrono::Duration::zero(),
        retry_delay: Duration::from_millis(10),
        ..ConsumerPolicy::default()
    }
}

#[tokio::test]
async fn web_text_reaches_the_app_once() {
    let (base, _shutdown) = start_relay().await;
    let web = RelayClient::new(&base);
    let token = web.generate_token().await.unwrap();
    web.upload_web_text(&token, "Groceries\nmilk\neggs").await.unwrap();

    let app = Consumer::new(RelayClient::new(&base), MemoryItems::default(), ConsumerPolicy::default());
    app.scan(&format!("{}/?token={}", base, token)).unwrap();

    let outcome = app.refresh().await.unwrap();
    let expected = LocalItem {
        title: "Groceries".into(),
        content: "Groceries\nmilk\neggs".into(),
    };
    assert_eq!(outcome, RefreshOutcome::Received(expected.clone()));
    assert_eq!(app.items().snapshot(), vec![expected]);

    assert_eq!(app.refresh().await.unwrap(), RefreshOutcome::NoNewText);
}

#[tokio::test]
async fn shared_notes_arrive_as_one_bundle() {
    let (base, _shutdown) = start_relay().await;
    let app = Consumer::new(
        RelayClient::new(&base),
        MemoryItems::with(&["first", "second"]),
        ConsumerPolicy::default(),
    );
    app.scan("tok-share").unwrap();

    let report = app.share_local_items().await.unwrap();
    assert_eq!(report.items, 2);
    assert_eq!(report.attempts, 1);

    let raw = RelayClient::new(&base).fetch_text_raw("tok-share").await.unwrap();
    assert_eq!(raw.status, 200);
    let body: Value = serde_json::from_str(&raw.body).unwrap();
    assert_eq!(body["text"], json!(encode(["first", "second"])));

    // Inside the cooldown window after our own upload.
    assert!(matches!(
        app.refresh().await,
        Err(ClientError::RefreshBlocked(RefreshBlocked::Cooldown { .. }))
    ));
}

#[tokio::test]
async fn large_share_goes_through_chunks() {
    let (base, _shutdown) = start_relay().await;
    let long_note = "lorem ipsum ".repeat(2000);
    let app = Consumer::new(
        RelayClient::new(&base),
        MemoryItems::with(&[&long_note]),
        ConsumerPolicy::default(),
    );
    app.scan("tok-chunks").unwrap();
    app.share_local_items().await.unwrap();

    let progress = app.progress();
    assert_eq!(progress.state(), STATE_COMPLETE);
    assert_eq!(progress.chunks_total.load(Ordering::Relaxed), 4);
    assert_eq!(progress.chunks_done.load(Ordering::Relaxed), 4);

    let raw = RelayClient::new(&base).fetch_text_raw("tok-chunks").await.unwrap();
    let body: Value = serde_json::from_str(&raw.body).unwrap();
    assert_eq!(body["text"], json!(encode([long_note.as_str()])));
}

#[tokio::test]
async fn scanning_without_a_token_is_rejected() {
    let (base, _shutdown) = start_relay().await;
    let app = Consumer::new(RelayClient::new(&base), MemoryItems::default(), ConsumerPolicy::default());
    assert!(matches!(app.scan("https://relay/?token="), Err(ClientError::InvalidInput(_))));
    assert!(matches!(app.refresh().await, Err(ClientError::InvalidInput(_))));
}

/// A relay that predates unread-web: only `/upload` and the legacy read.
#[derive(Default)]
struct LegacyRelay {
    latest: Mutex<Option<String>>,
    uploads: AtomicUsize,
    failures_left: AtomicUsize,
}

async fn legacy_upload(
    State(relay): State<Arc<LegacyRelay>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    relay.uploads.fetch_add(1, Ordering::SeqCst);
    if relay
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "error": "temporarily down"})),
        );
    }
    let text = body["text"].as_str().unwrap_or_default().to_string();
    *relay.latest.lock().unwrap() = Some(text);
    (StatusCode::OK, Json(json!({"ok": true})))
}

async fn legacy_text(
    State(relay): State<Arc<LegacyRelay>>,
    Path(_token): Path<String>,
) -> (StatusCode, Json<Value>) {
    match relay.latest.lock().unwrap().clone() {
        Some(text) => (StatusCode::OK, Json(json!({ "text": text }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"ok": false, "error": "No text found"})),
        ),
    }
}

async fn start_legacy(relay: Arc<LegacyRelay>) -> (String, oneshot::Sender<()>) {
    let app = Router::new()
        .route("/upload", post(legacy_upload))
        .route("/text/{token}", get(legacy_text))
        .with_state(relay);
    serve(app).await
}

#[tokio::test]
async fn legacy_fallback_skips_our_own_echo() {
    let relay = Arc::new(LegacyRelay::default());
    let (base, _shutdown) = start_legacy(relay.clone()).await;
    let app = Consumer::new(RelayClient::new(&base), MemoryItems::with(&["mine"]), quick_policy());
    app.scan("tok-legacy").unwrap();

    // Nothing stored yet: legacy 404 means no new text.
    assert_eq!(app.refresh().await.unwrap(), RefreshOutcome::NoNewText);

    app.share_local_items().await.unwrap();
    assert_eq!(app.refresh().await.unwrap(), RefreshOutcome::NoNewText);

    *relay.latest.lock().unwrap() = Some("from the web".into());
    assert!(matches!(
        app.refresh().await.unwrap(),
        RefreshOutcome::Received(LocalItem { ref content, .. }) if content == "from the web"
    ));
}

#[tokio::test]
async fn failed_upload_is_retried_once() {
    let relay = Arc::new(LegacyRelay::default());
    relay.failures_left.store(1, Ordering::SeqCst);
    let (base, _shutdown) = start_legacy(relay.clone()).await;
    let app = Consumer::new(RelayClient::new(&base), MemoryItems::with(&["retry me"]), quick_policy());
    app.scan("tok-retry").unwrap();

    let report = app.share_local_items().await.unwrap();
    assert_eq!(report.attempts, 2);
    assert_eq!(relay.uploads.load(Ordering::SeqCst), 2);
    assert_eq!(
        relay.latest.lock().unwrap().as_deref(),
        Some(encode(["retry me"]).as_str())
    );
}

#[tokio::test]
async fn upload_gives_up_after_the_retry() {
    let relay = Arc::new(LegacyRelay::default());
    relay.failures_left.store(5, Ordering::SeqCst);
    let (base, _shutdown) = start_legacy(relay.clone()).await;
    let app = Consumer::new(RelayClient::new(&base), MemoryItems::with(&["doomed"]), quick_policy());
    app.scan("tok-down").unwrap();

    assert!(matches!(
        app.share_local_items().await,
        Err(ClientError::Status { code: 500, .. })
    ));
    assert_eq!(relay.uploads.load(Ordering::SeqCst), 2);

    // The failed attempts released the token; a refresh is allowed again.
    assert_eq!(app.refresh().await.unwrap(), RefreshOutcome::NoNewText);
}

async fn flood() -> Json<Value> {
    let messages: Vec<Value> = (0..51)
        .map(|i| json!({"id": i.to_string(), "text": format!("m{}", i), "created_at": "2026-01-01T00:00:00Z"}))
        .collect();
    Json(json!({"ok": true, "messages": messages}))
}

#[tokio::test]
async fn oversized_read_is_rejected_without_saving() {
    let app_router = Router::new().route("/text/{token}/unread-web", get(flood));
    let (base, _shutdown) = serve(app_router).await;
    let app = Consumer::new(RelayClient::new(&base), MemoryItems::default(), quick_policy());
    app.scan("tok-flood").unwrap();

    assert!(matches!(app.refresh().await, Err(ClientError::UnexpectedShape(_))));
    assert!(app.items().snapshot().is_empty());
}

async fn one_huge_message() -> Json<Value> {
    Json(json!({"ok": true, "messages": [
        {"id": "1", "text": "fine", "created_at": "2026-01-01T00:00:00Z"},
        {"id": "2", "text": "z".repeat(200_000), "created_at": "2026-01-01T00:00:01Z"},
    ]}))
}

#[tokio::test]
async fn huge_message_aborts_the_refresh() {
    let app_router = Router::new().route("/text/{token}/unread-web", get(one_huge_message));
    let (base, _shutdown) = serve(app_router).await;
    let app = Consumer::new(RelayClient::new(&base), MemoryItems::default(), quick_policy());
    app.scan("tok-huge").unwrap();

    assert!(matches!(
        app.refresh().await,
        Err(ClientError::PayloadTooLarge(200_000))
    ));
    assert!(app.items().snapshot().is_empty());
}
