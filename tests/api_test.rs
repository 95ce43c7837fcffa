use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

use qrstash::api::models::{ErrorResponse, QrResponse};
use qrstash::api::router;
use qrstash::api::state::AppState;
use qrstash::config::Config;
use qrstash::observability::Metrics;
use qrstash::qr::{self, QrOptions};
use qrstash::queue::UploadBroker;
use qrstash::storage::{PNG_CONTENT_TYPE, StorageClient, qr_blob_path};
use qrstash::worker::{self, WorkerPool};

/// Config for tests: memory storage, environment secrets, small body limit
fn create_test_config() -> Config {
    let config_toml = r#"
[server]
max_request_bytes = 4096
cors_origins = ["http://localhost:3000"]

[storage]
provider = "memory"

[secrets]
provider = "environment"

[workers]
count = 2
channel_size = 16
    "#;

    toml::from_str(config_toml).expect("Failed to parse test config")
}

struct TestApp {
    app: Router,
    storage: Arc<StorageClient>,
    metrics: Arc<Metrics>,
    _workers: WorkerPool,
}

/// Builds a test app with running upload workers over the given storage
fn build_test_app_with_storage(storage: StorageClient) -> TestApp {
    let storage = Arc::new(storage);
    let metrics = Arc::new(Metrics::new());
    let config = create_test_config();

    let (broker, receivers) = UploadBroker::new(config.workers.count, config.workers.channel_size);
    let workers = worker::spawn_pool(receivers, storage.clone(), metrics.clone());

    let state = AppState::new(config, storage.clone(), broker, metrics.clone());

    TestApp {
        app: router(state),
        storage,
        metrics,
        _workers: workers,
    }
}

fn build_test_app() -> TestApp {
    build_test_app_with_storage(StorageClient::in_memory())
}

/// Helper to build a POST /generate-qr/ request
fn post_qr_request(payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .uri("/generate-qr/")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> axum::response::Response {
    ServiceExt::<Request<Body>>::oneshot(app.clone(), request)
        .await
        .unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn decode_data_uri(qr_image: &str) -> Vec<u8> {
    let payload = qr_image
        .strip_prefix("data:image/png;base64,")
        .expect("qr_image must be a PNG data URI");
    STANDARD.decode(payload).unwrap()
}

/// Reads the QR code back out of a PNG with an independent decoder
fn scan_qr(png: &[u8]) -> String {
    let luma = image::load_from_memory(png).unwrap().to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one QR code");
    let (_meta, content) = grids[0].decode().unwrap();
    content
}

/// Waits until the background worker has written `key`
async fn wait_for_blob(storage: &StorageClient, key: &str) -> bool {
    for _ in 0..100 {
        if storage.exists(key).await.unwrap() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_generate_qr_success() {
    let test_app = build_test_app();
    let url = "https://example.com";

    let response = send(&test_app.app, post_qr_request(json!({ "url": url }))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let qr: QrResponse = read_json(response).await;

    let id = Uuid::parse_str(&qr.id).unwrap();
    assert_eq!(id.get_version_num(), 4);

    let png = decode_data_uri(&qr.qr_image);
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

    // 19 bytes at level L needs version 2: (25 + 2*4) modules * 10 px
    let image = image::load_from_memory(&png).unwrap().to_luma8();
    assert_eq!(image.dimensions(), (330, 330));

    assert_eq!(scan_qr(&png), url);

    let expected = qr::encode_png(url, &QrOptions::default()).unwrap();
    assert_eq!(png, expected.to_vec());
}

#[tokio::test]
async fn test_generate_qr_scans_back_non_ascii() {
    let test_app = build_test_app();
    let url = "https://example.com/a?b=c&d=é";

    let response = send(&test_app.app, post_qr_request(json!({ "url": url }))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let qr: QrResponse = read_json(response).await;
    assert_eq!(scan_qr(&decode_data_uri(&qr.qr_image)), url);
}

#[tokio::test]
async fn test_generate_qr_distinct_ids() {
    let test_app = build_test_app();

    let first: QrResponse = read_json(
        send(&test_app.app, post_qr_request(json!({ "url": "https://example.com" }))).await,
    )
    .await;
    let second: QrResponse = read_json(
        send(&test_app.app, post_qr_request(json!({ "url": "https://example.com" }))).await,
    )
    .await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.qr_image, second.qr_image);
}

#[tokio::test]
async fn test_generate_qr_uploads_png() {
    let test_app = build_test_app();

    let response = send(
        &test_app.app,
        post_qr_request(json!({ "url": "https://example.com/upload" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let qr: QrResponse = read_json(response).await;

    let key = qr_blob_path(&Uuid::parse_str(&qr.id).unwrap());
    assert_eq!(key, format!("qr_codes/{}.png", qr.id));
    assert!(wait_for_blob(&test_app.storage, &key).await, "blob never appeared");

    let stored = test_app.storage.download(&key).await.unwrap();
    assert_eq!(stored.bytes.to_vec(), decode_data_uri(&qr.qr_image));
    assert_eq!(stored.content_type.as_deref(), Some(PNG_CONTENT_TYPE));

    let snapshot = test_app.metrics.snapshot();
    assert_eq!(snapshot.qr_generated, 1);
    assert_eq!(snapshot.uploads_enqueued, 1);
}

#[tokio::test]
async fn test_upload_failure_still_returns_ok() {
    let temp_dir = TempDir::new().unwrap();
    let storage = StorageClient::local(temp_dir.path(), "qr-images").unwrap();
    // A plain file where the prefix directory should be makes every put fail
    std::fs::write(temp_dir.path().join("qr-images/qr_codes"), b"blocker").unwrap();
    let test_app = build_test_app_with_storage(storage);

    let response = send(&test_app.app, post_qr_request(json!({ "url": "https://example.com" }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let qr: QrResponse = read_json(response).await;
    assert!(!decode_data_uri(&qr.qr_image).is_empty());

    let mut failed = 0;
    for _ in 0..100 {
        failed = test_app.metrics.snapshot().uploads_failed;
        if failed > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(failed, 1);
    assert_eq!(test_app.metrics.snapshot().uploads_succeeded, 0);
}

#[tokio::test]
async fn test_generate_qr_without_trailing_slash() {
    let test_app = build_test_app();

    let request = Request::builder()
        .uri("/generate-qr")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"url":"hello"}"#))
        .unwrap();

    let response = send(&test_app.app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_generate_qr_empty_url() {
    let test_app = build_test_app();

    let response = send(&test_app.app, post_qr_request(json!({ "url": "   " }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.code, "INVALID_PAYLOAD");
    assert_eq!(test_app.metrics.snapshot().qr_generated, 0);
}

#[tokio::test]
async fn test_generate_qr_missing_url() {
    let test_app = build_test_app();

    let response = send(&test_app.app, post_qr_request(json!({ "link": "https://example.com" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&test_app.app, post_qr_request(json!({ "url": 42 }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_qr_malformed_json() {
    let test_app = build_test_app();

    let request = Request::builder()
        .uri("/generate-qr/")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"url\": "))
        .unwrap();

    let response = send(&test_app.app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_qr_invalid_content_type() {
    let test_app = build_test_app();

    let request = Request::builder()
        .uri("/generate-qr/")
        .method("POST")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"url":"https://example.com"}"#))
        .unwrap();

    let response = send(&test_app.app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_qr_missing_content_type() {
    let test_app = build_test_app();

    let request = Request::builder()
        .uri("/generate-qr/")
        .method("POST")
        .body(Body::from(r#"{"url":"https://example.com"}"#))
        .unwrap();

    let response = send(&test_app.app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_qr_payload_too_large() {
    let test_app = build_test_app();

    let url = "a".repeat(5000);
    let response = send(&test_app.app, post_qr_request(json!({ "url": url }))).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.code, "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_generate_qr_input_too_long_for_qr() {
    let test_app = build_test_app();

    // Fits the body limit but not the largest QR version at level L
    let url = "a".repeat(3000);
    let response = send(&test_app.app, post_qr_request(json!({ "url": url }))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.code, "ENCODING_FAILED");
    assert_eq!(test_app.metrics.snapshot().uploads_enqueued, 0);
}

#[tokio::test]
async fn test_cors_preflight_allowed_origin() {
    let test_app = build_test_app();

    let request = Request::builder()
        .uri("/generate-qr/")
        .method("OPTIONS")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = send(&test_app.app, request).await;
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
}

#[tokio::test]
async fn test_cors_other_origin_not_allowed() {
    let test_app = build_test_app();

    let request = Request::builder()
        .uri("/generate-qr/")
        .method("POST")
        .header(header::ORIGIN, "http://evil.example")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"url":"https://example.com"}"#))
        .unwrap();

    let response = send(&test_app.app, request).await;
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_health_endpoint() {
    let test_app = build_test_app();

    let request = Request::builder()
        .uri("/health")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = send(&test_app.app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = read_json(response).await;
    assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("healthy"));
    assert!(health.get("version").is_some());

    let components = health.get("components").unwrap().as_object().unwrap();
    assert!(components.contains_key("api"));
    assert!(components.contains_key("upload_broker"));
    assert!(components.contains_key("storage"));
}

#[tokio::test]
async fn test_health_reports_dead_workers() {
    let storage = Arc::new(StorageClient::in_memory());
    let metrics = Arc::new(Metrics::new());
    let (broker, receivers) = UploadBroker::new(1, 4);
    drop(receivers);

    let state = AppState::new(create_test_config(), storage, broker, metrics);
    let app = router(state);

    let request = Request::builder()
        .uri("/health")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = read_json(response).await;
    assert_eq!(health["components"]["upload_broker"], "unhealthy");
}

#[tokio::test]
async fn test_saturated_upload_backlog_does_not_block_response() {
    let storage = Arc::new(StorageClient::in_memory());
    let metrics = Arc::new(Metrics::new());
    // One slot, and a worker that never drains it
    let (broker, _receivers) = UploadBroker::new(1, 1);

    let state = AppState::new(create_test_config(), storage, broker, metrics.clone());
    let app = router(state);

    for _ in 0..3 {
        let response = tokio::time::timeout(
            Duration::from_secs(3),
            send(&app, post_qr_request(json!({ "url": "https://example.com" }))),
        )
        .await
        .expect("response must not wait on the upload backlog");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.uploads_enqueued, 1);
    assert_eq!(snapshot.uploads_dropped, 2);
}

#[tokio::test]
async fn test_generate_qr_without_workers_still_answers() {
    let storage = Arc::new(StorageClient::in_memory());
    let metrics = Arc::new(Metrics::new());
    let (broker, receivers) = UploadBroker::new(2, 4);
    drop(receivers);

    let state = AppState::new(create_test_config(), storage, broker, metrics.clone());
    let app = router(state);

    let response = send(&app, post_qr_request(json!({ "url": "https://example.com" }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(metrics.snapshot().uploads_dropped, 1);
}
