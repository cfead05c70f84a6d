//! Bluetooth Low Energy discovery and connections.
//!
//! Scan results arrive as [`Sighting`]s from a platform [`BleCentral`] and are
//! folded into a [`BleReconciler`], which keeps two disjoint collections:
//! peripherals we are connected to and peripherals that can be connected.
//!
//! - [`reconciler`] - pure state transitions
//! - [`discovery`] - async orchestration (scan sessions, connect attempts)
//! - [`mock`] - deterministic in-memory central
//! - `bluez` - BlueZ-backed central (feature `bluetooth`)

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(feature = "bluetooth")]
pub mod bluez;
pub mod discovery;
pub mod mock;
pub mod reconciler;

#[cfg(feature = "bluetooth")]
pub use bluez::BluezCentral;
pub use discovery::{BleDiscovery, ScanSession};
pub use mock::{ConnectBehavior, MockCentral, MockDevice};
pub use reconciler::{BleReconciler, DiscoverySnapshot, SightingOutcome};

/// Errors raised by Bluetooth operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum BluetoothError {
    #[error("No Bluetooth adapter found")]
    AdapterNotFound,

    #[error("Bluetooth adapter is powered off")]
    AdapterPoweredOff,

    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    #[error("Device {id} is not available for connection")]
    NotAvailable { id: String },

    #[error("A connection to {id} is already in progress")]
    AlreadyConnecting { id: String },

    #[error("Invalid Bluetooth address: {address}")]
    InvalidAddress { address: String },

    #[error("Failed to connect: {message}")]
    ConnectFailed { id: String, message: String },

    #[error("Service discovery failed: {message}")]
    DiscoveryFailed { message: String },

    #[error("Bluetooth scan failed: {message}")]
    ScanFailed { message: String },

    #[error("Failed to open Bluetooth session: {message}")]
    SessionInitFailed { message: String },
}

/// Where a peripheral stands relative to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Seen advertising, not connected.
    Available,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected; the GATT profile has been read (or failed to read).
    Connected,
}

/// A GATT service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// Service UUID.
    pub uuid: Uuid,
    /// Whether this is a primary service.
    pub primary: bool,
}

/// A GATT characteristic with its access flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CharacteristicInfo {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// UUID of the owning service.
    pub service_uuid: Uuid,
    /// Supports reads.
    pub readable: bool,
    /// Supports writes with response.
    pub writable_with_response: bool,
    /// Supports writes without response.
    pub writable_without_response: bool,
    /// Supports notifications.
    pub notifiable: bool,
}

/// Services and characteristics read from a connected peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GattProfile {
    /// Discovered services.
    pub services: Vec<ServiceInfo>,
    /// Characteristics across all services.
    pub characteristics: Vec<CharacteristicInfo>,
}

/// A BLE peripheral known to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "C4:7C:8D:6A:3E:21",
    "name": "Heart Rate Monitor",
    "state": "available",
    "profile": null
}))]
pub struct Peripheral {
    /// Platform identifier (a MAC address on BlueZ).
    pub id: String,
    /// Advertised name.
    pub name: String,
    /// Connection state.
    pub state: ConnectionState,
    /// GATT profile, present once connected and discovered.
    pub profile: Option<GattProfile>,
}

impl Peripheral {
    /// A freshly sighted, unconnected peripheral.
    #[must_use]
    pub fn available(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: ConnectionState::Available,
            profile: None,
        }
    }

    /// A connected peripheral.
    #[must_use]
    pub fn connected(
        id: impl Into<String>,
        name: impl Into<String>,
        profile: Option<GattProfile>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: ConnectionState::Connected,
            profile,
        }
    }
}

/// One scan result as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    /// Platform identifier.
    pub id: String,
    /// Advertised name, if any.
    pub name: Option<String>,
    /// Whether the platform reports the peripheral as connected.
    pub connected: bool,
}

impl Sighting {
    /// Name usable for display, `None` when absent or blank.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }
}

/// A platform BLE central.
pub trait BleCentral: Send + Sync + 'static {
    /// Scan until `sightings` is closed, sending every reported peripheral.
    fn scan(
        &self,
        sightings: mpsc::Sender<Sighting>,
    ) -> impl Future<Output = Result<(), BluetoothError>> + Send;

    /// Connect to `id` and read its GATT profile.
    fn connect(&self, id: &str)
        -> impl Future<Output = Result<GattProfile, BluetoothError>> + Send;

    /// Read the GATT profile of an already-connected peripheral.
    fn discover(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<GattProfile, BluetoothError>> + Send;
}

/// The central selected at build time.
#[derive(Debug)]
pub enum Central {
    /// BlueZ over D-Bus.
    #[cfg(feature = "bluetooth")]
    Bluez(BluezCentral),
    /// In-memory devices.
    Mock(MockCentral),
}

impl Central {
    /// Open the platform central.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter is missing, powered off, or the session fails.
    #[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
    pub async fn open() -> Result<Self, BluetoothError> {
        BluezCentral::new().await.map(Self::Bluez)
    }

    /// Open the demo mock central.
    ///
    /// # Errors
    ///
    /// Never fails.
    #[cfg(any(not(feature = "bluetooth"), feature = "mock-bluetooth"))]
    #[allow(clippy::unused_async)]
    pub async fn open() -> Result<Self, BluetoothError> {
        tracing::info!("Using mock Bluetooth central");
        Ok(Self::Mock(MockCentral::demo()))
    }
}

impl From<MockCentral> for Central {
    fn from(mock: MockCentral) -> Self {
        Self::Mock(mock)
    }
}

impl BleCentral for Central {
    async fn scan(&self, sightings: mpsc::Sender<Sighting>) -> Result<(), BluetoothError> {
        match self {
            #[cfg(feature = "bluetooth")]
            Self::Bluez(central) => central.scan(sightings).await,
            Self::Mock(central) => central.scan(sightings).await,
        }
    }

    async fn connect(&self, id: &str) -> Result<GattProfile, BluetoothError> {
        match self {
            #[cfg(feature = "bluetooth")]
            Self::Bluez(central) => central.connect(id).await,
            Self::Mock(central) => central.connect(id).await,
        }
    }

    async fn discover(&self, id: &str) -> Result<GattProfile, BluetoothError> {
        match self {
            #[cfg(feature = "bluetooth")]
            Self::Bluez(central) => central.discover(id).await,
            Self::Mock(central) => central.discover(id).await,
        }
    }
}
