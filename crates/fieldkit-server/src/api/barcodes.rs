//! Barcode history API endpoints.
//!
//! Decoding happens on the scanning client; the server keeps the last few
//! scans.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use fieldkit_core::{dates, BarcodeRecord, Feature, Symbology};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the barcode router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_barcodes).post(record_barcode))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A decoded scan to record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "symbology": "ean13",
    "data": "4006381333931"
}))]
pub struct RecordBarcodeRequest {
    /// Symbology name, e.g. "qr" or "ean13".
    #[schema(example = "ean13")]
    pub symbology: String,

    /// Decoded payload. Must not be blank.
    #[schema(example = "4006381333931")]
    pub data: String,
}

/// A stored scan with a relative age.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "symbology": "ean13",
    "data": "4006381333931",
    "time_scanned": "2025-01-15T03:30:00Z",
    "scanned_ago": "5 minutes ago"
}))]
pub struct BarcodeEntry {
    /// Symbology the payload was encoded with.
    pub symbology: Symbology,

    /// Decoded payload.
    pub data: String,

    /// When the scan happened (UTC).
    pub time_scanned: String,

    /// Human-friendly age, e.g. "5 minutes ago".
    pub scanned_ago: String,
}

/// Barcode history response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BarcodeHistoryResponse {
    /// Most recent first.
    pub entries: Vec<BarcodeEntry>,

    /// Maximum number of entries kept.
    #[schema(example = 5)]
    pub limit: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List recorded scans.
#[utoipa::path(
    get,
    path = "/api/barcodes",
    tag = "barcodes",
    operation_id = "getBarcodeHistory",
    summary = "List recent barcode scans",
    description = "Returns the most recent scans, newest first. Only the last \
        five are kept.",
    responses(
        (status = 200, description = "History retrieved", body = BarcodeHistoryResponse),
        (status = 403, description = "Camera permission not granted", body = ErrorResponse)
    )
)]
pub async fn get_barcodes(
    State(state): State<SharedState>,
) -> ApiResult<Json<BarcodeHistoryResponse>> {
    state.config.permissions.require(Feature::Barcode)?;
    let now = Utc::now();
    let entries = state
        .barcodes
        .entries()
        .into_iter()
        .map(|record| BarcodeEntry {
            scanned_ago: dates::time_from_now(record.time_scanned, now),
            time_scanned: record.time_scanned.to_rfc3339(),
            symbology: record.symbology,
            data: record.data,
        })
        .collect();

    Ok(Json(BarcodeHistoryResponse {
        entries,
        limit: state.barcodes.limit(),
    }))
}

/// Record a decoded scan.
#[utoipa::path(
    post,
    path = "/api/barcodes",
    tag = "barcodes",
    operation_id = "recordBarcode",
    summary = "Record a barcode scan",
    description = "Adds a scan to the front of the history. When the history is \
        full the oldest scan is dropped. Identical scans are kept.",
    request_body = RecordBarcodeRequest,
    responses(
        (status = 201, description = "Scan recorded", body = BarcodeRecord),
        (status = 400, description = "Unknown symbology or empty data", body = ErrorResponse),
        (status = 403, description = "Camera permission not granted", body = ErrorResponse)
    )
)]
pub async fn record_barcode(
    State(state): State<SharedState>,
    Json(request): Json<RecordBarcodeRequest>,
) -> ApiResult<(StatusCode, Json<BarcodeRecord>)> {
    state.config.permissions.require(Feature::Barcode)?;
    let symbology: Symbology = request.symbology.parse().map_err(|_| ApiError::BadRequest {
        error_code: "UNKNOWN_SYMBOLOGY".to_string(),
        message: format!("Unknown symbology: '{}'", request.symbology),
    })?;

    let record = BarcodeRecord::new(symbology, request.data)?;
    let history = state.barcodes.push(record.clone());
    info!(%symbology, kept = history.len(), "Recorded barcode scan");

    Ok((StatusCode::CREATED, Json(record)))
}
