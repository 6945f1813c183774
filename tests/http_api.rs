//! Router-level tests that run without any WebDriver or browser.
//!
//! The 400 cases double as the proof that invalid barcodes never touch the
//! browser engine: no driver runs in this test environment, so any attempt
//! to allocate one would surface as a 500, not a 400.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use mobilfon_scraper::{AppState, Config, router};
use tower::ServiceExt;

fn test_state() -> AppState {
    let mut config = Config::from_env();
    config.portal_email = Some("dealer@example.com".to_string());
    config.portal_password = Some("secret".to_string());
    // No driver is expected to run during these tests.
    config.webdriver_endpoint = "auto".to_string();
    config.auto_start_driver = false;
    config.validate().expect("test config must validate");
    AppState::new(config)
}

async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router(test_state())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_lists_endpoints() {
    let (status, json) = get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Server is running");
    assert_eq!(json["endpoints"][0], "/api/mobilfon/search/:barcode");
}

#[tokio::test]
async fn short_barcode_is_rejected() {
    let (status, json) = get("/api/mobilfon/search/12345").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Geçersiz barkod formatı");
    assert_eq!(json["message"], "Barkod 15 haneli sayısal değer olmalıdır");
}

#[tokio::test]
async fn long_barcode_is_rejected() {
    let (status, _) = get("/api/mobilfon/search/1234567890123456").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_numeric_barcode_is_rejected() {
    let (status, json) = get("/api/mobilfon/search/12345678901234a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Geçersiz barkod formatı");
}

#[tokio::test]
async fn barcode_with_spaces_is_rejected() {
    let (status, _) = get("/api/mobilfon/search/123%2045678901234").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _) = get("/api/mobilfon/other").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn valid_barcode_without_driver_fails_with_taxonomy_tag() {
    // Auto-start is disabled and no endpoint is configured, so a valid
    // barcode passes validation and then fails before a session exists. The
    // failure must still be the normalized shape with the fixed hint.
    let (status, json) = get("/api/mobilfon/search/123456789012345").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["barcode"], "123456789012345");
    assert_eq!(json["error"], "UnexpectedBrowserFailure");
    assert_eq!(
        json["hint"],
        "Barkod Mobilfon sisteminde olmayabilir veya sayfa yapısı değişmiş olabilir"
    );
}
