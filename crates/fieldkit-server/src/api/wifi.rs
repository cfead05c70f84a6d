//! Wi-Fi API endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use fieldkit_core::{Feature, NetworkDetail, WifiSnapshot};

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the Wi-Fi router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/networks", get(scan_networks))
        .route("/networks/{bssid}", get(get_network))
}

/// Run a scan cycle.
#[utoipa::path(
    get,
    path = "/api/wifi/networks",
    tag = "wifi",
    operation_id = "scanWifiNetworks",
    summary = "Scan for Wi-Fi networks",
    description = "Re-reads the current association, runs a full scan and \
        returns one entry per network name, keeping the strongest signal. The \
        network we are associated with is reported separately under \
        `connected`. Hidden networks (blank SSID) are omitted.",
    responses(
        (status = 200, description = "Scan completed", body = WifiSnapshot),
        (status = 403, description = "Location permission not granted", body = ErrorResponse),
        (status = 503, description = "Wi-Fi backend unavailable or scan failed", body = ErrorResponse)
    )
)]
pub async fn scan_networks(State(state): State<SharedState>) -> ApiResult<Json<WifiSnapshot>> {
    state.config.permissions.require(Feature::Wifi)?;
    Ok(Json(state.wifi.refresh().await?))
}

/// Detail for a network from the last scan.
#[utoipa::path(
    get,
    path = "/api/wifi/networks/{bssid}",
    tag = "wifi",
    operation_id = "getWifiNetwork",
    summary = "Get network detail",
    description = "Returns SSID, BSSID, capabilities, frequency, level and \
        timestamp of a network retained by the most recent scan. The BSSID is \
        matched case-insensitively.",
    params(
        ("bssid" = String, Path, description = "Access point MAC address", example = "A4:2B:B0:C1:7E:10")
    ),
    responses(
        (status = 200, description = "Network detail", body = NetworkDetail),
        (status = 403, description = "Location permission not granted", body = ErrorResponse),
        (status = 404, description = "Not in the last scan", body = ErrorResponse)
    )
)]
pub async fn get_network(
    State(state): State<SharedState>,
    Path(bssid): Path<String>,
) -> ApiResult<Json<NetworkDetail>> {
    state.config.permissions.require(Feature::Wifi)?;
    let network = state.wifi.find(&bssid)?;
    Ok(Json(NetworkDetail::from(&network)))
}
