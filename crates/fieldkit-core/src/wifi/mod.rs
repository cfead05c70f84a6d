//! Wi-Fi scanning.
//!
//! Each scan cycle is reconciled from scratch: blank SSIDs are dropped, the
//! network matching the cached connected BSSID is pulled out, and the rest
//! are deduplicated by SSID keeping the strongest signal. Only the connected
//! BSSID survives between cycles.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

pub mod nmcli;

pub use nmcli::NmcliBackend;

/// Errors raised by Wi-Fi operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum WifiError {
    #[error("Wi-Fi backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Wi-Fi scan failed: {message}")]
    ScanFailed { message: String },

    #[error("Failed to query the current Wi-Fi connection: {message}")]
    ConnectionQueryFailed { message: String },

    #[error("Network not found: {bssid}")]
    NetworkNotFound { bssid: String },
}

/// One access point from a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "ssid": "HomeNetwork",
    "bssid": "A4:2B:B0:C1:7E:10",
    "level": -48,
    "frequency": 5180,
    "capabilities": "WPA2",
    "timestamp": "2025-01-15T03:30:00Z",
    "connected": false
}))]
pub struct WifiNetwork {
    /// Network name.
    pub ssid: String,
    /// Access point MAC address.
    pub bssid: String,
    /// Signal level in dBm.
    pub level: i32,
    /// Channel frequency in MHz.
    pub frequency: u32,
    /// Security description, empty for open networks.
    pub capabilities: String,
    /// When the access point was observed.
    pub timestamp: DateTime<Utc>,
    /// `true` for the network we are associated with.
    pub connected: bool,
}

/// Result of one scan cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WifiSnapshot {
    /// The network we are associated with, if it was seen this cycle.
    pub connected: Option<WifiNetwork>,
    /// One entry per SSID, strongest signal, in first-seen order.
    pub available: Vec<WifiNetwork>,
    /// When the cycle ran.
    pub scanned_at: DateTime<Utc>,
}

impl WifiSnapshot {
    /// Find a retained network by BSSID, ignoring case.
    #[must_use]
    pub fn find(&self, bssid: &str) -> Option<&WifiNetwork> {
        self.connected
            .iter()
            .chain(self.available.iter())
            .find(|network| network.bssid.eq_ignore_ascii_case(bssid))
    }
}

/// Reconcile one full scan.
///
/// The first entry whose BSSID matches `connected_bssid` becomes the
/// connected network and is kept out of `available`. Among the rest, a later
/// entry replaces an earlier one with the same SSID only if its level is
/// strictly higher.
#[must_use]
pub fn reconcile_scan(
    entries: impl IntoIterator<Item = WifiNetwork>,
    connected_bssid: Option<&str>,
    scanned_at: DateTime<Utc>,
) -> WifiSnapshot {
    let connected_bssid = connected_bssid.map(str::to_ascii_uppercase);
    let mut connected = None;
    let mut available: Vec<WifiNetwork> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for mut entry in entries {
        if entry.ssid.trim().is_empty() {
            continue;
        }
        entry.connected = false;

        if connected.is_none()
            && connected_bssid.as_deref() == Some(entry.bssid.to_ascii_uppercase().as_str())
        {
            entry.connected = true;
            connected = Some(entry);
            continue;
        }

        match slots.get(&entry.ssid) {
            Some(&slot) => {
                if entry.level > available[slot].level {
                    available[slot] = entry;
                }
            }
            None => {
                slots.insert(entry.ssid.clone(), available.len());
                available.push(entry);
            }
        }
    }

    WifiSnapshot {
        connected,
        available,
        scanned_at,
    }
}

/// A platform Wi-Fi stack.
pub trait WifiBackend: Send + Sync + 'static {
    /// BSSID of the current association, if any.
    fn connected_bssid(&self) -> impl Future<Output = Result<Option<String>, WifiError>> + Send;

    /// Every access point from a fresh scan.
    fn scan(&self) -> impl Future<Output = Result<Vec<WifiNetwork>, WifiError>> + Send;
}

/// A backend that reports a fixed scan.
#[derive(Debug, Default)]
pub struct FixedBackend {
    networks: Mutex<Vec<WifiNetwork>>,
    connected_bssid: Mutex<Option<String>>,
}

impl FixedBackend {
    /// Report `networks` on every scan, associated with `connected_bssid`.
    #[must_use]
    pub fn new(networks: Vec<WifiNetwork>, connected_bssid: Option<&str>) -> Self {
        Self {
            networks: Mutex::new(networks),
            connected_bssid: Mutex::new(connected_bssid.map(str::to_string)),
        }
    }

    /// A few neighbouring networks for demos.
    #[must_use]
    pub fn demo() -> Self {
        let now = Utc::now();
        let ap = |ssid: &str, bssid: &str, level, frequency, capabilities: &str| WifiNetwork {
            ssid: ssid.to_string(),
            bssid: bssid.to_string(),
            level,
            frequency,
            capabilities: capabilities.to_string(),
            timestamp: now,
            connected: false,
        };
        Self::new(
            vec![
                ap("HomeNetwork", "A4:2B:B0:C1:7E:10", -48, 5180, "WPA2"),
                ap("HomeNetwork", "A4:2B:B0:C1:7E:11", -61, 2437, "WPA2"),
                ap("CoffeeShop", "10:5A:F7:02:9B:44", -70, 2412, ""),
                ap("", "5C:E9:31:88:0D:7A", -55, 2462, "WPA2"),
                ap("CoffeeShop", "10:5A:F7:02:9B:45", -66, 5745, ""),
            ],
            Some("A4:2B:B0:C1:7E:10"),
        )
    }
}

#[cfg(test)]
impl FixedBackend {
    fn set_connected_bssid(&self, bssid: Option<&str>) {
        *self.connected_bssid.lock() = bssid.map(str::to_string);
    }
}

impl WifiBackend for FixedBackend {
    async fn connected_bssid(&self) -> Result<Option<String>, WifiError> {
        Ok(self.connected_bssid.lock().clone())
    }

    async fn scan(&self) -> Result<Vec<WifiNetwork>, WifiError> {
        Ok(self.networks.lock().clone())
    }
}

/// The backend selected at startup.
#[derive(Debug)]
pub enum WifiDriver {
    /// NetworkManager via `nmcli`.
    Nmcli(NmcliBackend),
    /// Canned results.
    Fixed(FixedBackend),
}

impl WifiDriver {
    /// The system backend.
    #[must_use]
    pub fn system() -> Self {
        Self::Nmcli(NmcliBackend::default())
    }
}

impl WifiBackend for WifiDriver {
    async fn connected_bssid(&self) -> Result<Option<String>, WifiError> {
        match self {
            Self::Nmcli(backend) => backend.connected_bssid().await,
            Self::Fixed(backend) => backend.connected_bssid().await,
        }
    }

    async fn scan(&self) -> Result<Vec<WifiNetwork>, WifiError> {
        match self {
            Self::Nmcli(backend) => backend.scan().await,
            Self::Fixed(backend) => backend.scan().await,
        }
    }
}

/// Runs scan cycles and remembers the connected BSSID and the last result.
#[derive(Debug)]
pub struct WifiScanner<B> {
    backend: B,
    connected_bssid: Mutex<Option<String>>,
    last: Mutex<Option<WifiSnapshot>>,
}

impl<B: WifiBackend> WifiScanner<B> {
    /// Wrap `backend` with an empty cache.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            connected_bssid: Mutex::new(None),
            last: Mutex::new(None),
        }
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Re-read the current association into the cache.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the cache is left unchanged.
    pub async fn refresh_connection(&self) -> Result<Option<String>, WifiError> {
        let bssid = self.backend.connected_bssid().await?;
        debug!(bssid = ?bssid, "Refreshed Wi-Fi connection");
        *self.connected_bssid.lock() = bssid.clone();
        Ok(bssid)
    }

    /// Cached connected BSSID.
    #[must_use]
    pub fn connected_bssid(&self) -> Option<String> {
        self.connected_bssid.lock().clone()
    }

    /// Run one scan cycle against the cached connection.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the last snapshot is left unchanged.
    pub async fn scan(&self) -> Result<WifiSnapshot, WifiError> {
        let entries = self.backend.scan().await?;
        let total = entries.len();
        let connected = self.connected_bssid();
        let snapshot = reconcile_scan(entries, connected.as_deref(), Utc::now());

        info!(
            scanned = total,
            available = snapshot.available.len(),
            connected = snapshot.connected.is_some(),
            "Wi-Fi scan complete"
        );
        *self.last.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Refresh the connection, then scan.
    ///
    /// A failed connection query is logged and the previous cache is used.
    ///
    /// # Errors
    ///
    /// Returns the scan error.
    pub async fn refresh(&self) -> Result<WifiSnapshot, WifiError> {
        if let Err(e) = self.refresh_connection().await {
            warn!(error = %e, "Using cached Wi-Fi connection");
        }
        self.scan().await
    }

    /// Look up a network from the most recent scan.
    ///
    /// # Errors
    ///
    /// Returns [`WifiError::NetworkNotFound`] if no retained entry has `bssid`.
    pub fn find(&self, bssid: &str) -> Result<WifiNetwork, WifiError> {
        self.last
            .lock()
            .as_ref()
            .and_then(|snapshot| snapshot.find(bssid).cloned())
            .ok_or_else(|| WifiError::NetworkNotFound {
                bssid: bssid.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    fn ap(ssid: &str, bssid: &str, level: i32) -> WifiNetwork {
        WifiNetwork {
            ssid: ssid.to_string(),
            bssid: bssid.to_string(),
            level,
            frequency: 2437,
            capabilities: "WPA2".to_string(),
            timestamp: at(),
            connected: false,
        }
    }

    fn bssids(networks: &[WifiNetwork]) -> Vec<&str> {
        networks.iter().map(|n| n.bssid.as_str()).collect()
    }

    #[test]
    fn test_strongest_signal_wins() {
        let snapshot = reconcile_scan(
            vec![ap("Home", "01", -70), ap("Cafe", "02", -60), ap("Home", "03", -50)],
            None,
            at(),
        );
        assert_eq!(bssids(&snapshot.available), vec!["03", "02"]);
        assert!(snapshot.connected.is_none());
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let snapshot = reconcile_scan(vec![ap("Home", "01", -60), ap("Home", "02", -60)], None, at());
        assert_eq!(bssids(&snapshot.available), vec!["01"]);
    }

    #[test]
    fn test_blank_ssids_dropped() {
        let snapshot = reconcile_scan(vec![ap("", "01", -30), ap("   ", "02", -30)], None, at());
        assert!(snapshot.available.is_empty());
    }

    #[test]
    fn test_connected_bssid_excluded_case_insensitively() {
        let snapshot = reconcile_scan(
            vec![ap("Home", "a4:2b:00:00:00:01", -40), ap("Home", "A4:2B:00:00:00:02", -70)],
            Some("A4:2B:00:00:00:01"),
            at(),
        );
        let connected = snapshot.connected.unwrap();
        assert_eq!(connected.bssid, "a4:2b:00:00:00:01");
        assert!(connected.connected);
        assert_eq!(bssids(&snapshot.available), vec!["A4:2B:00:00:00:02"]);
        assert!(!snapshot.available[0].connected);
    }

    #[test]
    fn test_only_first_connected_match_recorded() {
        let snapshot = reconcile_scan(
            vec![ap("Home", "01", -40), ap("Home", "01", -45)],
            Some("01"),
            at(),
        );
        assert_eq!(snapshot.connected.unwrap().level, -40);
        assert_eq!(snapshot.available.len(), 1);
    }

    #[tokio::test]
    async fn test_scanner_uses_refreshed_connection() {
        let scanner = WifiScanner::new(FixedBackend::demo());
        let snapshot = scanner.refresh().await.unwrap();

        assert_eq!(snapshot.connected.as_ref().unwrap().bssid, "A4:2B:B0:C1:7E:10");
        let ssids: Vec<&str> = snapshot.available.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["HomeNetwork", "CoffeeShop"]);
        assert_eq!(snapshot.available[1].bssid, "10:5A:F7:02:9B:45");

        let found = scanner.find("a4:2b:b0:c1:7e:11").unwrap();
        assert_eq!(found.level, -61);
        assert!(matches!(
            scanner.find("00:00:00:00:00:00"),
            Err(WifiError::NetworkNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_clears_cache() {
        let scanner = WifiScanner::new(FixedBackend::demo());
        scanner.refresh_connection().await.unwrap();
        assert!(scanner.connected_bssid().is_some());

        scanner.backend().set_connected_bssid(None);
        scanner.refresh_connection().await.unwrap();
        let snapshot = scanner.scan().await.unwrap();
        assert!(snapshot.connected.is_none());
    }

    fn network() -> impl Strategy<Value = WifiNetwork> {
        (
            prop::sample::select(vec!["", "Home", "Cafe", "Lab"]),
            0u8..8,
            -100i32..-20,
        )
            .prop_map(|(ssid, n, level)| ap(ssid, &format!("00:00:00:00:00:{n:02X}"), level))
    }

    proptest! {
        #[test]
        fn prop_retained_level_dominates(
            entries in prop::collection::vec(network(), 0..32),
            connected in prop::option::of(0u8..8),
        ) {
            let connected = connected.map(|n| format!("00:00:00:00:00:{n:02X}"));
            let snapshot = reconcile_scan(entries.clone(), connected.as_deref(), at());

            let mut seen = std::collections::HashSet::new();
            for kept in &snapshot.available {
                prop_assert!(seen.insert(kept.ssid.clone()), "duplicate SSID {}", kept.ssid);
                prop_assert!(!kept.ssid.trim().is_empty());
                for other in entries.iter().filter(|e| e.ssid == kept.ssid) {
                    let is_connected = snapshot.connected.as_ref() == Some(&WifiNetwork { connected: true, ..other.clone() });
                    prop_assert!(is_connected || kept.level >= other.level);
                }
            }
        }
    }
}
