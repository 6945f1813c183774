//! HTTP surface: health endpoint and the barcode search endpoint.
//!
//! Validation happens here, before any browser resource is allocated; the
//! pipeline owns everything past that point.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::barcode::Barcode;
use crate::config::Config;
use crate::driver::DriverManager;
use crate::error::ScrapeError;
use crate::pipeline;
use crate::response::{FailureResponse, HealthResponse, SearchResponse, ValidationResponse};

const SHUTDOWN_CLEANUP_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub drivers: DriverManager,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            drivers: DriverManager::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/api/mobilfon/search/{barcode}", get(search))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(config: Config, bind_addr: &str) -> anyhow::Result<()> {
    let state = AppState::new(config);
    let drivers = state.drivers.clone();

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("🚀 Mobilfon scraper API listening on http://{bind_addr}");
    info!("endpoint: http://{bind_addr}/api/mobilfon/search/:barcode");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            info!("received shutdown signal, stopping managed drivers");
            if tokio::time::timeout(SHUTDOWN_CLEANUP_TIMEOUT, drivers.stop_all())
                .await
                .is_err()
            {
                warn!("driver cleanup timed out after {SHUTDOWN_CLEANUP_TIMEOUT:?}");
            }
            info!("graceful shutdown complete");
        })
        .await?;

    info!("Mobilfon scraper API stopped");
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse::current())
}

async fn search(State(state): State<AppState>, Path(raw_barcode): Path<String>) -> Response {
    let barcode = match Barcode::parse(&raw_barcode) {
        Ok(barcode) => barcode,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ValidationResponse::bad_barcode()),
            )
                .into_response();
        }
    };

    let endpoint = match state.drivers.resolve_endpoint(&state.config).await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            error!(barcode = %barcode, "❌ no WebDriver endpoint available: {e}");
            return failure(barcode.as_str(), &e);
        }
    };

    match pipeline::scrape(&state.config, &endpoint, &barcode).await {
        Ok(record) => {
            info!(barcode = %barcode, parts = record.parts.len(), "✅ scrape complete");
            (
                StatusCode::OK,
                Json(SearchResponse::new(barcode.to_string(), record)),
            )
                .into_response()
        }
        Err(e) => {
            error!(barcode = %barcode, kind = e.kind(), "❌ scrape failed: {e}");
            failure(barcode.as_str(), &e)
        }
    }
}

fn failure(barcode: &str, error: &ScrapeError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FailureResponse::from_error(barcode.to_string(), error)),
    )
        .into_response()
}
