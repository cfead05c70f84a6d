//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use fieldkit_core::{
    BarcodeRecord, BleDiscovery, BoundedHistory, Central, Config, ScanSession, Storage,
    WeatherClient, WeatherService, WifiDriver, WifiScanner,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// State handle passed to every handler.
pub type SharedState = Arc<AppState>;

/// Shared application state.
///
/// Each tool owns its own synchronization, so handlers only need `&AppState`.
#[derive(Debug)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// Zipcode and location lookups.
    pub weather: WeatherService,
    /// BLE discovery, `None` when no adapter could be opened.
    pub bluetooth: Option<BleDiscovery<Central>>,
    /// Wi-Fi scan cycles.
    pub wifi: WifiScanner<WifiDriver>,
    /// Barcode scan history.
    pub barcodes: BoundedHistory<BarcodeRecord>,
    scan_session: Mutex<Option<ScanSession>>,
    started_at: Instant,
}

impl AppState {
    /// Create state using the platform Bluetooth and Wi-Fi stacks.
    ///
    /// A missing or powered-off Bluetooth adapter is not fatal; the Bluetooth
    /// routes report it instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the weather client cannot be built.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let central = match Central::open().await {
            Ok(central) => Some(central),
            Err(e) => {
                warn!(error = %e, "Bluetooth unavailable");
                None
            }
        };
        Self::with_drivers(config, central, WifiDriver::system())
    }

    /// Create state with explicit radio drivers.
    ///
    /// # Errors
    ///
    /// Returns an error if the weather client cannot be built.
    pub fn with_drivers(
        config: Config,
        central: Option<Central>,
        wifi: WifiDriver,
    ) -> anyhow::Result<Self> {
        let data_dir = config.data_dir();
        let limit = config.storage.history_limit;
        info!(data_dir = %data_dir.display(), limit, "Opening histories");

        let storage = Storage::new(data_dir);
        let client = WeatherClient::new(&config.weather)?;

        Ok(Self {
            weather: WeatherService::new(client, BoundedHistory::zipcodes(storage.clone(), limit)),
            bluetooth: central.map(BleDiscovery::new),
            wifi: WifiScanner::new(wifi),
            barcodes: BoundedHistory::barcodes(storage, limit),
            scan_session: Mutex::new(None),
            started_at: Instant::now(),
            config,
        })
    }

    /// Start a fresh scan session, ending any previous one.
    ///
    /// Returns when the new session started, or `None` without Bluetooth.
    pub async fn start_scan(&self) -> Option<DateTime<Utc>> {
        let discovery = self.bluetooth.as_ref()?;
        let session = discovery.start_scan();
        let started_at = session.started_at();
        if let Some(previous) = self.scan_session.lock().await.replace(session) {
            previous.stop();
        }
        Some(started_at)
    }

    /// End the current scan session. Returns `false` if none was running.
    pub async fn stop_scan(&self) -> bool {
        self.scan_session
            .lock()
            .await
            .take()
            .map(ScanSession::stop)
            .is_some()
    }

    /// `true` while a scan session is running.
    pub async fn is_scanning(&self) -> bool {
        self.scan_session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| !session.is_finished())
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
