//! # fieldkit-core
//!
//! Core business logic for the fieldkit device utility service.
//!
//! This crate provides:
//! - Bluetooth Low Energy discovery and connection-state reconciliation
//! - Wi-Fi scan reconciliation (one entry per network name, strongest signal wins)
//! - Weather lookup by zipcode or coordinates
//! - Bounded, persisted histories for zipcode searches and barcode scans
//! - Configuration management and permission gates
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`ble`] - BLE sighting reconciler, connect flow, scan sessions and platform centrals
//! - [`wifi`] - Wi-Fi scan reconciler and platform backends
//! - [`weather`] - Weather provider client and zipcode lookup flow
//! - [`history`] - Capped, most-recent-first histories persisted under fixed keys
//! - [`storage`] - Key-value persistence using JSON files
//! - [`barcode`] - Barcode symbologies and scan records
//! - [`detail`] - Typed, validated detail payloads for devices and networks
//! - [`dates`] - Human-friendly date labels
//! - [`permissions`] - Feature permission requirements
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod barcode;
pub mod ble;
pub mod config;
pub mod dates;
pub mod detail;
pub mod error;
pub mod history;
pub mod permissions;
pub mod storage;
pub mod weather;
pub mod wifi;

// Re-export primary types for convenience
pub use barcode::{BarcodeRecord, Symbology};
pub use ble::{
    BleCentral, BleDiscovery, BleReconciler, BluetoothError, Central, ConnectionState,
    DiscoverySnapshot, GattProfile, MockCentral, MockDevice, Peripheral, ScanSession, Sighting,
};
pub use config::{
    Config, ConfigError, ConfigResult, DisplayConfig, PermissionsConfig, ServerConfig,
    StorageConfig, WeatherConfig,
};
pub use detail::{DetailError, DetailPayload, DeviceDetail, NetworkDetail};
pub use error::{Error, FieldkitError, Result};
pub use history::{BoundedHistory, BARCODE_STORAGE_KEY, MAX_HISTORY_ITEMS, ZIPCODE_STORAGE_KEY};
pub use permissions::{Feature, Permission};
pub use storage::{default_data_dir, Storage};
pub use weather::{
    Coordinates, ForecastBundle, HistoryTemperature, WeatherClient, WeatherService, Zipcode,
    ZipcodeLookup,
};
pub use wifi::{WifiBackend, WifiDriver, WifiError, WifiNetwork, WifiScanner, WifiSnapshot};
