//! Bluetooth API endpoints.
//!
//! Provides endpoints for BLE scan sessions, the discovery view, and
//! connecting to peripherals.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fieldkit_core::{
    BleDiscovery, Central, DeviceDetail, DiscoverySnapshot, Feature, FieldkitError, Peripheral,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::{AppState, SharedState};

/// Creates the Bluetooth router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scan", post(start_scan).delete(stop_scan))
        .route("/devices", get(list_devices))
        .route("/devices/{id}", get(get_device))
        .route("/devices/{id}/connect", post(connect_device))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Scan session status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "scanning": true,
    "started_at_utc": "2025-01-15T03:30:00Z"
}))]
pub struct ScanStatusResponse {
    /// Whether a scan session is running after this call.
    #[schema(example = true)]
    pub scanning: bool,

    /// When the running session started.
    #[schema(example = "2025-01-15T03:30:00Z")]
    pub started_at_utc: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Permission-checked access to the discovery state.
fn discovery(state: &AppState) -> ApiResult<&BleDiscovery<Central>> {
    state.config.permissions.require(Feature::Bluetooth)?;
    state
        .bluetooth
        .as_ref()
        .ok_or_else(ApiError::bluetooth_unavailable)
}

/// Start a scan session.
#[utoipa::path(
    post,
    path = "/api/bluetooth/scan",
    tag = "bluetooth",
    operation_id = "startBluetoothScan",
    summary = "Start scanning for BLE peripherals",
    description = "Starts a scan session that keeps folding sightings into the \
        discovery view until stopped. Starting a scan while one is running \
        replaces the old session.",
    responses(
        (status = 202, description = "Scan started", body = ScanStatusResponse),
        (status = 403, description = "Bluetooth permissions not granted", body = ErrorResponse),
        (status = 503, description = "No Bluetooth adapter", body = ErrorResponse)
    )
)]
pub async fn start_scan(
    State(state): State<SharedState>,
) -> ApiResult<(StatusCode, Json<ScanStatusResponse>)> {
    discovery(&state)?;
    let started_at = state
        .start_scan()
        .await
        .ok_or_else(ApiError::bluetooth_unavailable)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanStatusResponse {
            scanning: true,
            started_at_utc: Some(started_at.to_rfc3339()),
        }),
    ))
}

/// Stop the scan session.
#[utoipa::path(
    delete,
    path = "/api/bluetooth/scan",
    tag = "bluetooth",
    operation_id = "stopBluetoothScan",
    summary = "Stop scanning",
    description = "Ends the running scan session, if any. The discovery view is \
        kept. Stopping when nothing is running is not an error.",
    responses(
        (status = 200, description = "Scan stopped", body = ScanStatusResponse),
        (status = 403, description = "Bluetooth permissions not granted", body = ErrorResponse),
        (status = 503, description = "No Bluetooth adapter", body = ErrorResponse)
    )
)]
pub async fn stop_scan(State(state): State<SharedState>) -> ApiResult<Json<ScanStatusResponse>> {
    discovery(&state)?;
    if state.stop_scan().await {
        info!("BLE scan stopped on request");
    }
    Ok(Json(ScanStatusResponse {
        scanning: false,
        started_at_utc: None,
    }))
}

/// Current discovery view.
#[utoipa::path(
    get,
    path = "/api/bluetooth/devices",
    tag = "bluetooth",
    operation_id = "listBluetoothDevices",
    summary = "List discovered peripherals",
    description = "Returns the connected and available peripherals and the ids \
        with a connect attempt in flight. A peripheral appears in at most one of \
        `connected` and `available`. Unnamed peripherals are never listed.",
    responses(
        (status = 200, description = "Discovery view", body = DiscoverySnapshot),
        (status = 403, description = "Bluetooth permissions not granted", body = ErrorResponse),
        (status = 503, description = "No Bluetooth adapter", body = ErrorResponse)
    )
)]
pub async fn list_devices(State(state): State<SharedState>) -> ApiResult<Json<DiscoverySnapshot>> {
    Ok(Json(discovery(&state)?.snapshot()))
}

/// Services and characteristics of a known peripheral.
#[utoipa::path(
    get,
    path = "/api/bluetooth/devices/{id}",
    tag = "bluetooth",
    operation_id = "getBluetoothDevice",
    summary = "Get peripheral detail",
    description = "Returns the services and characteristics of a known \
        peripheral. Both lists are empty until the peripheral is connected.",
    params(
        ("id" = String, Path, description = "Peripheral identifier", example = "C4:7C:8D:6A:3E:21")
    ),
    responses(
        (status = 200, description = "Peripheral detail", body = DeviceDetail),
        (status = 404, description = "Peripheral never sighted", body = ErrorResponse),
        (status = 503, description = "No Bluetooth adapter", body = ErrorResponse)
    )
)]
pub async fn get_device(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeviceDetail>> {
    let peripheral = discovery(&state)?
        .find(&id)
        .ok_or(FieldkitError::DeviceNotFound(id))?;
    Ok(Json(DeviceDetail::from(&peripheral)))
}

/// Connect to an available peripheral.
#[utoipa::path(
    post,
    path = "/api/bluetooth/devices/{id}/connect",
    tag = "bluetooth",
    operation_id = "connectBluetoothDevice",
    summary = "Connect to a peripheral",
    description = "Connects to an available peripheral and reads its GATT \
        profile. On success the peripheral moves from `available` to \
        `connected`. On failure it stays available and the error message \
        reads \"Failed to connect: <reason>\".",
    params(
        ("id" = String, Path, description = "Peripheral identifier", example = "C4:7C:8D:6A:3E:21")
    ),
    responses(
        (status = 200, description = "Connected", body = Peripheral),
        (status = 404, description = "Peripheral never sighted", body = ErrorResponse),
        (status = 409, description = "Already connected or connect in progress", body = ErrorResponse),
        (status = 502, description = "Connect or service discovery failed", body = ErrorResponse),
        (status = 503, description = "No Bluetooth adapter", body = ErrorResponse)
    )
)]
pub async fn connect_device(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Peripheral>> {
    let peripheral = discovery(&state)?.connect(&id).await?;
    Ok(Json(peripheral))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_status_serialization() {
        let response = ScanStatusResponse {
            scanning: false,
            started_at_utc: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"scanning\":false"));
        assert!(json.contains("\"started_at_utc\":null"));
    }
}
