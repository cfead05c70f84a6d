//! OpenAPI specification generation for the fieldkit API.
//!
//! The document is served at `/api/openapi.json` and written to the workspace
//! root by the `gen-openapi` binary. Descriptions are written to be read by
//! both developers and AI agents.

use axum::Json;
use fieldkit_core::ble::{CharacteristicInfo, ServiceInfo};
use fieldkit_core::detail::{CharacteristicDetail, ServiceDetail};
use fieldkit_core::{
    BarcodeRecord, ConnectionState, DeviceDetail, DiscoverySnapshot, GattProfile,
    HistoryTemperature, NetworkDetail, Peripheral, Symbology, WifiNetwork, WifiSnapshot,
};
use utoipa::OpenApi;

use super::barcodes::{BarcodeEntry, BarcodeHistoryResponse, RecordBarcodeRequest};
use super::bluetooth::ScanStatusResponse;
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::weather::{CurrentConditionDto, DailyForecastDto, WeatherResponse};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for fieldkit.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "fieldkit API",
        version = "0.1.0",
        description = r#"
# fieldkit API

fieldkit bundles four small device tools behind one HTTP API.

## Overview

1. **Weather**: forecast by US zipcode (remembered in a five-entry history) or by coordinates
2. **Bluetooth**: BLE scan sessions, a connected/available discovery view, and connecting
3. **Wi-Fi**: scan cycles that keep one entry per network name, strongest signal wins
4. **Barcodes**: a five-entry history of decoded scans

## For AI Agents (MCP)

- **getWeather**: zipcode lookups. A zipcode the provider does not know is reported as "Invalid zipcode".
- **listBluetoothDevices**: call after **startBluetoothScan** to see what is nearby.
- **connectBluetoothDevice**: only for peripherals listed under `available`.
- **scanWifiNetworks**: each call runs a fresh scan.

## Permissions

Each tool is gated on the permissions it needs (location, Bluetooth scan and
connect, camera). A closed gate answers 403 with `PERMISSION_REQUIRED`.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local fieldkit server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks and service status"
        ),
        (
            name = "weather",
            description = "Forecasts by zipcode or position, and the zipcode search history"
        ),
        (
            name = "bluetooth",
            description = "BLE scan sessions, discovery view, and connecting to peripherals"
        ),
        (
            name = "wifi",
            description = "Wi-Fi scan cycles and network detail"
        ),
        (
            name = "barcodes",
            description = "History of decoded barcode scans"
        ),
        (
            name = "detail",
            description = "Validation of detail payloads handed from list views"
        )
    ),
    paths(
        // Health endpoints
        super::health::health_check,
        // Weather endpoints
        super::weather::get_weather,
        super::weather::get_current_weather,
        super::weather::get_weather_history,
        // Bluetooth endpoints
        super::bluetooth::start_scan,
        super::bluetooth::stop_scan,
        super::bluetooth::list_devices,
        super::bluetooth::get_device,
        super::bluetooth::connect_device,
        // Wi-Fi endpoints
        super::wifi::scan_networks,
        super::wifi::get_network,
        // Barcode endpoints
        super::barcodes::get_barcodes,
        super::barcodes::record_barcode,
        // Detail endpoints
        super::detail::decode_device,
        super::detail::decode_network,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health types
            HealthResponse,
            // Weather types
            WeatherResponse,
            CurrentConditionDto,
            DailyForecastDto,
            HistoryTemperature,
            // Bluetooth types
            ScanStatusResponse,
            DiscoverySnapshot,
            Peripheral,
            ConnectionState,
            GattProfile,
            ServiceInfo,
            CharacteristicInfo,
            // Wi-Fi types
            WifiSnapshot,
            WifiNetwork,
            // Barcode types
            Symbology,
            BarcodeRecord,
            BarcodeEntry,
            BarcodeHistoryResponse,
            RecordBarcodeRequest,
            // Detail types
            DeviceDetail,
            ServiceDetail,
            CharacteristicDetail,
            NetworkDetail,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "fieldkit API");
        assert!(!spec.paths.paths.is_empty());
        assert!(spec.paths.paths.contains_key("/api/weather"));
        assert!(spec.paths.paths.contains_key("/api/bluetooth/devices/{id}/connect"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"fieldkit API\""));
    }
}
