//! fieldkit MCP Server
//!
//! Exposes the fieldkit HTTP API as MCP tools for AI agents, over stdio.
//!
//! # Environment Variables
//!
//! - `FIELDKIT_SERVER_URL`: Optional. Base URL of the fieldkit server (default: http://127.0.0.1:3000)
//! - `FIELDKIT_MCP_TIMEOUT_SECS`: Optional. Per-request timeout (default: 15)
//! - `RUST_LOG`: Optional. Logging level (default: info)

use std::time::Duration;

use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars,
    tool, tool_handler, tool_router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{error, info};
use url::Url;

/// Environment variable names
mod env_vars {
    pub const SERVER_URL: &str = "FIELDKIT_SERVER_URL";
    pub const TIMEOUT_SECS: &str = "FIELDKIT_MCP_TIMEOUT_SECS";
}

/// Default configuration values
mod defaults {
    pub const SERVER_URL: &str = "http://127.0.0.1:3000";
    pub const TIMEOUT_SECS: u64 = 15;
}

/// Custom error types for the MCP server
#[derive(Debug, thiserror::Error)]
pub enum FieldkitMcpError {
    #[error("FIELDKIT_SERVER_URL is not a valid URL: {0}")]
    InvalidServerUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuildFailed(#[source] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },
}

/// Configuration for the MCP server
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the fieldkit HTTP server
    pub server_url: Url,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, FieldkitMcpError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FieldkitMcpError> {
        let raw = lookup(env_vars::SERVER_URL)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| defaults::SERVER_URL.to_string());
        let server_url =
            Url::parse(raw.trim()).map_err(|e| FieldkitMcpError::InvalidServerUrl(format!("{raw}: {e}")))?;

        let timeout_secs = lookup(env_vars::TIMEOUT_SECS)
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults::TIMEOUT_SECS);

        Ok(Self {
            server_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// API response types
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentCondition {
    pub temperature_f: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyForecast {
    pub label: String,
    pub max_temp_f: Option<i32>,
    pub min_temp_f: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub zipcode: Option<String>,
    pub area_name: String,
    pub current: Option<CurrentCondition>,
    pub days: Vec<DailyForecast>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Peripheral {
    pub id: String,
    pub name: String,
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    pub connected: Vec<Peripheral>,
    pub available: Vec<Peripheral>,
    pub connecting: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    pub bssid: String,
    pub level: i32,
    pub frequency: u32,
    pub capabilities: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WifiSnapshot {
    pub connected: Option<WifiNetwork>,
    pub available: Vec<WifiNetwork>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BarcodeEntry {
    pub symbology: String,
    pub data: String,
    pub scanned_ago: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BarcodeHistoryResponse {
    pub entries: Vec<BarcodeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordBarcodeRequest {
    pub symbology: String,
    pub data: String,
}

/// HTTP client for talking to the fieldkit server
#[derive(Clone)]
pub struct FieldkitClient {
    client: reqwest::Client,
    base_url: Url,
}

impl FieldkitClient {
    pub fn new(config: &Config) -> Result<Self, FieldkitMcpError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(FieldkitMcpError::ClientBuildFailed)?;

        Ok(Self {
            client,
            base_url: config.server_url.clone(),
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = request.send().await.context("fieldkit server unreachable")?;
        let status = resp.status();
        if !status.is_success() {
            let message = match resp.json::<ErrorResponse>().await {
                Ok(body) => body.message,
                Err(_) => status.to_string(),
            };
            return Err(FieldkitMcpError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        resp.json().await.context("Failed to parse fieldkit response")
    }

    pub async fn get_weather(&self, zipcode: &str) -> Result<WeatherResponse> {
        let url = self.base_url.join("/api/weather")?;
        self.send(self.client.get(url).query(&[("zipcode", zipcode)])).await
    }

    pub async fn get_current_weather(&self, lat: f64, lng: f64) -> Result<WeatherResponse> {
        let url = self.base_url.join("/api/weather/current")?;
        self.send(self.client.get(url).query(&[("lat", lat), ("lng", lng)]))
            .await
    }

    pub async fn start_bluetooth_scan(&self) -> Result<serde_json::Value> {
        let url = self.base_url.join("/api/bluetooth/scan")?;
        self.send(self.client.post(url)).await
    }

    pub async fn list_bluetooth_devices(&self) -> Result<DiscoverySnapshot> {
        let url = self.base_url.join("/api/bluetooth/devices")?;
        self.send(self.client.get(url)).await
    }

    pub async fn connect_bluetooth_device(&self, id: &str) -> Result<Peripheral> {
        let mut url = self.base_url.join("/api/bluetooth/devices")?;
        url.path_segments_mut()
            .map_err(|()| FieldkitMcpError::InvalidServerUrl(self.base_url.to_string()))?
            .push(id)
            .push("connect");
        self.send(self.client.post(url)).await
    }

    pub async fn scan_wifi(&self) -> Result<WifiSnapshot> {
        let url = self.base_url.join("/api/wifi/networks")?;
        self.send(self.client.get(url)).await
    }

    pub async fn get_barcode_history(&self) -> Result<BarcodeHistoryResponse> {
        let url = self.base_url.join("/api/barcodes")?;
        self.send(self.client.get(url)).await
    }

    pub async fn record_barcode(&self, symbology: &str, data: &str) -> Result<serde_json::Value> {
        let url = self.base_url.join("/api/barcodes")?;
        self.send(self.client.post(url).json(&RecordBarcodeRequest {
            symbology: symbology.to_string(),
            data: data.to_string(),
        }))
        .await
    }
}

// Text rendering for tool results

fn format_weather(resp: &WeatherResponse) -> String {
    if resp.days.is_empty() {
        return "No forecast is available for this location.".to_string();
    }

    let place = match (&resp.zipcode, resp.area_name.is_empty()) {
        (Some(zipcode), true) => zipcode.clone(),
        (Some(zipcode), false) => format!("{} ({zipcode})", resp.area_name),
        (None, false) => resp.area_name.clone(),
        (None, true) => "your location".to_string(),
    };

    let mut text = format!("Weather for {place}");
    if let Some(current) = &resp.current {
        if let Some(temp) = current.temperature_f {
            text.push_str(&format!(": currently {temp}°F"));
        }
        if let Some(description) = &current.description {
            text.push_str(&format!(", {description}"));
        }
    }
    text.push('\n');

    for day in &resp.days {
        let high = day.max_temp_f.map_or_else(|| "?".to_string(), |t| t.to_string());
        let low = day.min_temp_f.map_or_else(|| "?".to_string(), |t| t.to_string());
        text.push_str(&format!("- {}: high {high}°F, low {low}°F\n", day.label));
    }
    text
}

fn format_devices(snapshot: &DiscoverySnapshot) -> String {
    if snapshot.connected.is_empty() && snapshot.available.is_empty() {
        return "No Bluetooth devices found yet. The scan may still be running.".to_string();
    }

    let mut text = String::new();
    for (title, devices) in [("Connected", &snapshot.connected), ("Available", &snapshot.available)] {
        if devices.is_empty() {
            continue;
        }
        text.push_str(&format!("{title}:\n"));
        for device in devices {
            let marker = if snapshot.connecting.contains(&device.id) {
                " (connecting)"
            } else {
                ""
            };
            text.push_str(&format!("- {} [{}]{marker}\n", device.name, device.id));
        }
    }
    text
}

fn format_networks(snapshot: &WifiSnapshot) -> String {
    let mut text = match &snapshot.connected {
        Some(network) => format!(
            "Connected to {} ({}, {} dBm)\n",
            network.ssid, network.bssid, network.level
        ),
        None => "Not connected to a Wi-Fi network.\n".to_string(),
    };

    if snapshot.available.is_empty() {
        text.push_str("No other networks in range.");
        return text;
    }

    text.push_str("Available networks:\n");
    for network in &snapshot.available {
        let security = if network.capabilities.is_empty() {
            "open"
        } else {
            network.capabilities.as_str()
        };
        text.push_str(&format!(
            "- {}: {} dBm, {} MHz, {security}\n",
            network.ssid, network.level, network.frequency
        ));
    }
    text
}

fn format_barcodes(history: &BarcodeHistoryResponse) -> String {
    if history.entries.is_empty() {
        return "No barcodes scanned yet.".to_string();
    }

    let mut text = String::from("Recent scans:\n");
    for entry in &history.entries {
        text.push_str(&format!(
            "- {} ({}), {}\n",
            entry.data, entry.symbology, entry.scanned_ago
        ));
    }
    text
}

// Tool parameter types
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetWeatherArgs {
    /// Five-digit US zipcode (e.g., '10001')
    pub zipcode: String,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetCurrentWeatherArgs {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lng: f64,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListBluetoothDevicesArgs {
    /// Start a new scan session before listing. Defaults to false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_scan: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ConnectBluetoothDeviceArgs {
    /// Device identifier as listed by list_bluetooth_devices (e.g., 'C4:7C:8D:6A:3E:21')
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RecordBarcodeArgs {
    /// Symbology name, e.g. 'qr', 'ean13', 'code128'
    pub symbology: String,
    /// Decoded payload
    pub data: String,
}

fn tool_error(action: &str, e: &anyhow::Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("Failed to {action}: {e}"))])
}

/// The MCP server handler for fieldkit
#[derive(Clone)]
pub struct FieldkitMcpServer {
    client: FieldkitClient,
    tool_router: ToolRouter<FieldkitMcpServer>,
}

#[tool_router]
impl FieldkitMcpServer {
    pub fn new(client: FieldkitClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    /// Forecast for a US zipcode
    #[tool(description = "Get the current conditions and daily forecast for a five-digit US zipcode. Successful lookups are remembered in the search history.")]
    async fn get_weather(
        &self,
        Parameters(args): Parameters<GetWeatherArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.get_weather(args.zipcode.trim()).await {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(format_weather(&resp))])),
            Err(e) => Ok(tool_error("get weather", &e)),
        }
    }

    /// Forecast for coordinates
    #[tool(description = "Get the current conditions and daily forecast for a latitude/longitude position. Does not change the zipcode search history.")]
    async fn get_current_weather(
        &self,
        Parameters(args): Parameters<GetCurrentWeatherArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.get_current_weather(args.lat, args.lng).await {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(format_weather(&resp))])),
            Err(e) => Ok(tool_error("get weather", &e)),
        }
    }

    /// Discovered Bluetooth devices
    #[tool(description = "List nearby Bluetooth Low Energy devices, split into connected and available. Set start_scan to true to begin a new scan first; devices appear over the following seconds.")]
    async fn list_bluetooth_devices(
        &self,
        Parameters(args): Parameters<ListBluetoothDevicesArgs>,
    ) -> Result<CallToolResult, McpError> {
        if args.start_scan.unwrap_or(false) {
            if let Err(e) = self.client.start_bluetooth_scan().await {
                return Ok(tool_error("start a Bluetooth scan", &e));
            }
        }

        match self.client.list_bluetooth_devices().await {
            Ok(snapshot) => Ok(CallToolResult::success(vec![Content::text(format_devices(
                &snapshot,
            ))])),
            Err(e) => Ok(tool_error("list Bluetooth devices", &e)),
        }
    }

    /// Connect to a Bluetooth device
    #[tool(description = "Connect to an available Bluetooth device by id and read its services. Only devices listed as available can be connected.")]
    async fn connect_bluetooth_device(
        &self,
        Parameters(args): Parameters<ConnectBluetoothDeviceArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.connect_bluetooth_device(args.id.trim()).await {
            Ok(device) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Connected to {} [{}].",
                device.name, device.id
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    /// Scan Wi-Fi networks
    #[tool(description = "Scan for Wi-Fi networks. Returns the connected network and one entry per network name with the strongest signal.")]
    async fn scan_wifi(&self) -> Result<CallToolResult, McpError> {
        match self.client.scan_wifi().await {
            Ok(snapshot) => Ok(CallToolResult::success(vec![Content::text(format_networks(
                &snapshot,
            ))])),
            Err(e) => Ok(tool_error("scan Wi-Fi", &e)),
        }
    }

    /// Barcode scan history
    #[tool(description = "Get the most recent barcode scans (at most five), newest first.")]
    async fn get_barcode_history(&self) -> Result<CallToolResult, McpError> {
        match self.client.get_barcode_history().await {
            Ok(history) => Ok(CallToolResult::success(vec![Content::text(format_barcodes(
                &history,
            ))])),
            Err(e) => Ok(tool_error("get barcode history", &e)),
        }
    }

    /// Record a barcode scan
    #[tool(description = "Record a decoded barcode scan in the history. The oldest scan is dropped once five are stored.")]
    async fn record_barcode(
        &self,
        Parameters(args): Parameters<RecordBarcodeArgs>,
    ) -> Result<CallToolResult, McpError> {
        if args.data.trim().is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "Barcode data cannot be empty.",
            )]));
        }

        match self.client.record_barcode(&args.symbology, &args.data).await {
            Ok(_) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Recorded {} barcode '{}'.",
                args.symbology, args.data
            ))])),
            Err(e) => Ok(tool_error("record barcode", &e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for FieldkitMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "fieldkit-mcp".to_string(),
                title: Some("fieldkit MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "fieldkit MCP Server - weather, Bluetooth, Wi-Fi and barcode tools. \
                \n\nTools available:\
                \n- get_weather: Forecast for a US zipcode\
                \n- get_current_weather: Forecast for a latitude/longitude\
                \n- list_bluetooth_devices: Connected and available BLE devices\
                \n- connect_bluetooth_device: Connect to an available device\
                \n- scan_wifi: Nearby Wi-Fi networks\
                \n- get_barcode_history: Recent barcode scans\
                \n- record_barcode: Store a decoded scan"
                    .to_string(),
            ),
        }
    }
}

/// Setup signal handlers for graceful shutdown
fn setup_signal_handlers() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let (mut sigint, mut sigterm) =
                match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                    (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("Failed to install signal handlers: {}", e);
                        std::future::pending::<()>().await;
                        return;
                    }
                };

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating shutdown...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = tx.send(());
    });

    rx
}

/// Initialize logging
///
/// Logs go to stderr; stdout carries the MCP protocol.
fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fieldkit_mcp=debug,rmcp=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("fieldkit MCP Server starting...");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Using fieldkit server at {}", config.server_url);

    let shutdown_rx = setup_signal_handlers();

    let client = FieldkitClient::new(&config).context("Failed to create HTTP client")?;
    let mcp_server = FieldkitMcpServer::new(client);

    info!("Starting MCP server with stdio transport");
    let transport = rmcp::transport::stdio();

    tokio::select! {
        result = mcp_server.serve(transport) => {
            match result {
                Ok(ct) => {
                    info!("MCP server running, waiting for completion...");
                    if let Err(e) = ct.waiting().await {
                        error!("MCP server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to start MCP server: {}", e);
                }
            }
        }
        _ = shutdown_rx => {
            info!("Shutdown signal received");
        }
    }

    info!("fieldkit MCP Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_url.as_str(), "http://127.0.0.1:3000/");
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup(&[
            (env_vars::SERVER_URL, "http://fieldkit.local:8080"),
            (env_vars::TIMEOUT_SECS, "3"),
        ]))
        .unwrap();
        assert_eq!(config.server_url.host_str(), Some("fieldkit.local"));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_config_invalid_url() {
        let result = Config::from_lookup(lookup(&[(env_vars::SERVER_URL, "not a url")]));
        assert!(matches!(result, Err(FieldkitMcpError::InvalidServerUrl(_))));
    }

    #[test]
    fn test_format_weather() {
        let resp = WeatherResponse {
            zipcode: Some("10001".to_string()),
            area_name: "New York".to_string(),
            current: Some(CurrentCondition {
                temperature_f: Some(72),
                description: Some("Sunny".to_string()),
            }),
            days: vec![DailyForecast {
                label: "Today".to_string(),
                max_temp_f: Some(75),
                min_temp_f: None,
            }],
        };
        let text = format_weather(&resp);
        assert!(text.starts_with("Weather for New York (10001): currently 72°F, Sunny"));
        assert!(text.contains("- Today: high 75°F, low ?°F"));

        let empty = WeatherResponse {
            zipcode: None,
            area_name: String::new(),
            current: None,
            days: vec![],
        };
        assert_eq!(format_weather(&empty), "No forecast is available for this location.");
    }

    #[test]
    fn test_format_devices_marks_connecting() {
        let snapshot = DiscoverySnapshot {
            connected: vec![],
            available: vec![Peripheral {
                id: "C4:7C:8D:6A:3E:21".to_string(),
                name: "Heart Rate Monitor".to_string(),
                state: "connecting".to_string(),
            }],
            connecting: vec!["C4:7C:8D:6A:3E:21".to_string()],
        };
        let text = format_devices(&snapshot);
        assert!(text.contains("Available:"));
        assert!(!text.contains("Connected:"));
        assert!(text.contains("Heart Rate Monitor [C4:7C:8D:6A:3E:21] (connecting)"));
    }

    #[test]
    fn test_format_networks() {
        let snapshot = WifiSnapshot {
            connected: None,
            available: vec![WifiNetwork {
                ssid: "CoffeeShop".to_string(),
                bssid: "10:5A:F7:02:9B:45".to_string(),
                level: -66,
                frequency: 5745,
                capabilities: String::new(),
            }],
        };
        let text = format_networks(&snapshot);
        assert!(text.starts_with("Not connected"));
        assert!(text.contains("- CoffeeShop: -66 dBm, 5745 MHz, open"));
    }

    #[test]
    fn test_format_barcodes() {
        assert_eq!(
            format_barcodes(&BarcodeHistoryResponse { entries: vec![] }),
            "No barcodes scanned yet."
        );
    }
}
