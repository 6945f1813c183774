//! Live end-to-end flow against the real dealer portal.
//!
//! Ignored by default: needs a chromedriver/geckodriver on PATH plus real
//! `MOBILFON_EMAIL`/`MOBILFON_PASSWORD` values. Run with:
//!
//! ```text
//! MOBILFON_EMAIL=... MOBILFON_PASSWORD=... cargo test --test live_portal -- --ignored
//! ```

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use mobilfon_scraper::{AppState, Config, router};
use tower::ServiceExt;

#[tokio::test]
#[ignore = "requires a WebDriver on PATH and real portal credentials"]
async fn full_flow_returns_normalized_shape() {
    let config = Config::from_env();
    config.validate().expect("set MOBILFON_EMAIL and MOBILFON_PASSWORD");

    let response = router(AppState::new(config))
        .oneshot(
            Request::builder()
                .uri("/api/mobilfon/search/123456789012345")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    // Whether or not the barcode exists, the response must be one of the two
    // normalized shapes.
    match status {
        StatusCode::OK => {
            assert_eq!(json["success"], true);
            assert!(json["mobilfonData"]["partsCount"].is_number());
            assert!(json["mobilfonData"]["parts"].is_array());
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            assert_eq!(json["success"], false);
            assert!(json["error"].is_string());
            assert!(json["hint"].as_str().unwrap().contains("Mobilfon"));
        }
        other => panic!("unexpected status: {other}"),
    }
}
