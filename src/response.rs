//! Wire shapes for the HTTP surface.
//!
//! Field names follow the upstream consumer's contract (`mobilfonData`,
//! `partsCount`, `fetchedAt`), so everything serializes camelCase.

use serde::Serialize;

use crate::barcode::{INVALID_BARCODE_ERROR, INVALID_BARCODE_MESSAGE};
use crate::error::ScrapeError;
use crate::pipeline::PartsRecord;

/// Fixed suggestion attached to every pipeline failure. The heuristics
/// cannot distinguish "not logged in", "not found" and "layout changed", so
/// the hint is deliberately not derived from the cause.
pub const FAILURE_HINT: &str =
    "Barkod Mobilfon sisteminde olmayabilir veya sayfa yapısı değişmiş olabilir";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub endpoints: Vec<&'static str>,
}

impl HealthResponse {
    pub fn current() -> Self {
        Self {
            status: "Server is running",
            endpoints: vec!["/api/mobilfon/search/:barcode"],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobilfonData {
    pub parts: Vec<String>,
    pub technician: String,
    pub parts_count: usize,
    pub fetched_at: String,
    pub method: &'static str,
}

impl From<PartsRecord> for MobilfonData {
    fn from(record: PartsRecord) -> Self {
        Self {
            parts: record.parts,
            technician: record.technician,
            parts_count: record.parts_count,
            fetched_at: record.fetched_at,
            method: record.method.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub barcode: String,
    pub mobilfon_data: MobilfonData,
}

impl SearchResponse {
    pub fn new(barcode: String, record: PartsRecord) -> Self {
        Self {
            success: true,
            barcode,
            mobilfon_data: record.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    /// Taxonomy tag (`StageFailure`, `TimeoutExceeded`, ...), not prose.
    pub error: &'static str,
    pub message: String,
    pub barcode: String,
    pub hint: &'static str,
}

impl FailureResponse {
    pub fn from_error(barcode: String, error: &ScrapeError) -> Self {
        Self {
            success: false,
            error: error.kind(),
            message: error.to_string(),
            barcode,
            hint: FAILURE_HINT,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub error: &'static str,
    pub message: &'static str,
}

impl ValidationResponse {
    pub fn bad_barcode() -> Self {
        Self {
            error: INVALID_BARCODE_ERROR,
            message: INVALID_BARCODE_MESSAGE,
        }
    }
}
