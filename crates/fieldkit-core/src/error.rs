//! Unified error types for the fieldkit core library.
//!
//! This module provides a unified error type [`FieldkitError`] that covers all failure
//! modes across the fieldkit system. Each module also has its own specific error types
//! (`ConfigError`, `BluetoothError`, `WifiError`, `DetailError`) for internal use.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages guide users toward resolution
//! - **Context preservation**: Wrapped errors maintain their original context
//! - **HTTP-ready**: Error types include HTTP status codes and error codes
//!
//! Weather and history failures never appear here: those boundaries degrade to
//! empty values instead of propagating errors.
//!
//! # Example
//!
//! ```rust
//! use fieldkit_core::error::{FieldkitError, Result};
//!
//! fn require_payload(data: &str) -> Result<()> {
//!     if data.trim().is_empty() {
//!         return Err(FieldkitError::EmptyBarcode);
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all fieldkit operations.
///
/// This enum covers all failure modes that can occur in the fieldkit system.
/// Each variant is designed to be:
///
/// 1. **Self-descriptive**: The variant name indicates the failure mode
/// 2. **Contextual**: Variants include relevant data for debugging
/// 3. **Actionable**: Error messages suggest how to resolve the issue
#[derive(Debug, Error)]
pub enum FieldkitError {
    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    BluetoothAdapterNotFound,

    /// The Bluetooth adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    BluetoothAdapterPoweredOff,

    /// Bluetooth device scanning failed.
    #[error("Bluetooth scan failed: {0}")]
    BluetoothScanFailed(String),

    /// The requested device has never been sighted.
    #[error("Device not found: '{0}'. Ensure the device is powered on and within range.")]
    DeviceNotFound(String),

    /// The device is known but not in the available set (already connected).
    #[error("Device '{0}' is not available for connection")]
    DeviceNotAvailable(String),

    /// A connect attempt for this device is already in flight.
    #[error("A connection to '{0}' is already in progress")]
    ConnectInProgress(String),

    /// Connecting or discovering services failed.
    #[error("Failed to connect: {message}")]
    ConnectFailed {
        /// Device that failed to connect.
        id: String,
        /// Message reported by the Bluetooth stack.
        message: String,
    },

    // =========================================================================
    // WI-FI ERRORS
    // =========================================================================
    /// The Wi-Fi scan could not be performed.
    #[error("Failed to scan for networks: {0}")]
    WifiScanFailed(String),

    /// The Wi-Fi backend is not installed or not running.
    #[error("Wi-Fi backend unavailable: {0}")]
    WifiUnavailable(String),

    /// No network with this BSSID was seen in the last scan.
    #[error("Network not found: '{0}'. Run a scan first.")]
    NetworkNotFound(String),

    // =========================================================================
    // WEATHER & BARCODE ERRORS
    // =========================================================================
    /// The zipcode is malformed or the provider knows no forecast for it.
    #[error("Invalid zipcode")]
    InvalidZipcode(String),

    /// Latitude or longitude outside the valid range.
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// A barcode scan was submitted without a payload.
    #[error("Barcode data cannot be empty")]
    EmptyBarcode,

    // =========================================================================
    // PERMISSION & DETAIL ERRORS
    // =========================================================================
    /// A permission gate denied access to a feature.
    #[error("{permission} permission is required to use {feature}")]
    PermissionRequired {
        /// Feature that was requested.
        feature: String,
        /// First missing permission.
        permission: String,
    },

    /// A detail payload failed schema validation.
    #[error("Invalid detail payload: {0}")]
    InvalidDetail(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for fieldkit operations.
pub type Result<T> = std::result::Result<T, FieldkitError>;

/// Short alias for [`FieldkitError`].
pub type Error = FieldkitError;

impl FieldkitError {
    /// Returns `true` if this error is related to Bluetooth operations.
    #[inline]
    #[must_use]
    pub const fn is_bluetooth_error(&self) -> bool {
        matches!(
            self,
            Self::BluetoothAdapterNotFound
                | Self::BluetoothAdapterPoweredOff
                | Self::BluetoothScanFailed(_)
                | Self::DeviceNotFound(_)
                | Self::DeviceNotAvailable(_)
                | Self::ConnectInProgress(_)
                | Self::ConnectFailed { .. }
        )
    }

    /// Returns `true` if this error is related to Wi-Fi operations.
    #[inline]
    #[must_use]
    pub const fn is_wifi_error(&self) -> bool {
        matches!(
            self,
            Self::WifiScanFailed(_) | Self::WifiUnavailable(_) | Self::NetworkNotFound(_)
        )
    }

    /// Returns `true` if this error represents an expected operational state.
    ///
    /// A denied permission or an unknown zipcode is a normal answer, not a
    /// system failure.
    #[inline]
    #[must_use]
    pub const fn is_expected_state(&self) -> bool {
        matches!(
            self,
            Self::PermissionRequired { .. } | Self::InvalidZipcode(_)
        )
    }

    /// Returns `true` if retrying the same request may succeed.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound(_)
                | Self::BluetoothScanFailed(_)
                | Self::ConnectFailed { .. }
                | Self::ConnectInProgress(_)
                | Self::WifiScanFailed(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidZipcode(_)
            | Self::InvalidCoordinates(_)
            | Self::EmptyBarcode
            | Self::InvalidDetail(_) => 400,

            // 403 Forbidden - permission gate closed
            Self::PermissionRequired { .. } => 403,

            // 404 Not Found
            Self::ConfigNotFound(_) | Self::DeviceNotFound(_) | Self::NetworkNotFound(_) => 404,

            // 409 Conflict - device state does not allow the operation
            Self::DeviceNotAvailable(_) | Self::ConnectInProgress(_) => 409,

            // 422 Unprocessable Entity - semantic errors
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error - server-side issues
            Self::PersistenceError(_) | Self::IoError(_) => 500,

            // 502 Bad Gateway - the peripheral rejected or dropped us
            Self::ConnectFailed { .. } => 502,

            // 503 Service Unavailable - radio hardware issues
            Self::BluetoothAdapterNotFound
            | Self::BluetoothAdapterPoweredOff
            | Self::BluetoothScanFailed(_)
            | Self::WifiScanFailed(_)
            | Self::WifiUnavailable(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BluetoothAdapterNotFound => "BLUETOOTH_ADAPTER_NOT_FOUND",
            Self::BluetoothAdapterPoweredOff => "BLUETOOTH_ADAPTER_POWERED_OFF",
            Self::BluetoothScanFailed(_) => "BLUETOOTH_SCAN_FAILED",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::DeviceNotAvailable(_) => "DEVICE_NOT_AVAILABLE",
            Self::ConnectInProgress(_) => "CONNECT_IN_PROGRESS",
            Self::ConnectFailed { .. } => "CONNECT_FAILED",
            Self::WifiScanFailed(_) => "WIFI_SCAN_FAILED",
            Self::WifiUnavailable(_) => "WIFI_UNAVAILABLE",
            Self::NetworkNotFound(_) => "NETWORK_NOT_FOUND",
            Self::InvalidZipcode(_) => "INVALID_ZIPCODE",
            Self::InvalidCoordinates(_) => "INVALID_COORDINATES",
            Self::EmptyBarcode => "EMPTY_BARCODE",
            Self::PermissionRequired { .. } => "PERMISSION_REQUIRED",
            Self::InvalidDetail(_) => "INVALID_DETAIL",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for FieldkitError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::ReadError { path, source } => {
                Self::PersistenceError(format!("Failed to read {}: {}", path.display(), source))
            }
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::ble::BluetoothError> for FieldkitError {
    fn from(err: crate::ble::BluetoothError) -> Self {
        use crate::ble::BluetoothError;
        match err {
            BluetoothError::AdapterNotFound => Self::BluetoothAdapterNotFound,
            BluetoothError::AdapterPoweredOff => Self::BluetoothAdapterPoweredOff,
            BluetoothError::DeviceNotFound { id } => Self::DeviceNotFound(id),
            BluetoothError::NotAvailable { id } => Self::DeviceNotAvailable(id),
            BluetoothError::AlreadyConnecting { id } => Self::ConnectInProgress(id),
            BluetoothError::ConnectFailed { id, message } => Self::ConnectFailed { id, message },
            BluetoothError::InvalidAddress { address } => {
                Self::DeviceNotFound(format!("{address} (not a Bluetooth address)"))
            }
            BluetoothError::SessionInitFailed { message }
            | BluetoothError::DiscoveryFailed { message }
            | BluetoothError::ScanFailed { message } => Self::BluetoothScanFailed(message),
        }
    }
}

impl From<crate::wifi::WifiError> for FieldkitError {
    fn from(err: crate::wifi::WifiError) -> Self {
        use crate::wifi::WifiError;
        match err {
            WifiError::BackendUnavailable { message } => Self::WifiUnavailable(message),
            WifiError::ScanFailed { message } | WifiError::ConnectionQueryFailed { message } => {
                Self::WifiScanFailed(message)
            }
            WifiError::NetworkNotFound { bssid } => Self::NetworkNotFound(bssid),
        }
    }
}

impl From<crate::detail::DetailError> for FieldkitError {
    fn from(err: crate::detail::DetailError) -> Self {
        Self::InvalidDetail(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_bluetooth_error_classification() {
        assert!(FieldkitError::BluetoothAdapterNotFound.is_bluetooth_error());
        assert!(FieldkitError::BluetoothScanFailed("test".into()).is_bluetooth_error());
        assert!(FieldkitError::ConnectInProgress("AA".into()).is_bluetooth_error());
        assert!(FieldkitError::ConnectFailed {
            id: "AA".into(),
            message: "timeout".into()
        }
        .is_bluetooth_error());

        assert!(!FieldkitError::EmptyBarcode.is_bluetooth_error());
    }

    #[test]
    fn test_wifi_error_classification() {
        assert!(FieldkitError::WifiScanFailed("busy".into()).is_wifi_error());
        assert!(FieldkitError::NetworkNotFound("AA".into()).is_wifi_error());
        assert!(!FieldkitError::BluetoothAdapterNotFound.is_wifi_error());
    }

    #[test]
    fn test_expected_state() {
        assert!(FieldkitError::InvalidZipcode("00000".into()).is_expected_state());
        assert!(FieldkitError::PermissionRequired {
            feature: "Wi-Fi scanning".into(),
            permission: "Location".into()
        }
        .is_expected_state());
        assert!(!FieldkitError::BluetoothAdapterNotFound.is_expected_state());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(FieldkitError::DeviceNotFound("AA".into()).is_recoverable());
        assert!(FieldkitError::WifiScanFailed("busy".into()).is_recoverable());
        assert!(!FieldkitError::BluetoothAdapterNotFound.is_recoverable());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(FieldkitError::InvalidZipcode("1".into()).http_status_code(), 400);
        assert_eq!(
            FieldkitError::PermissionRequired {
                feature: "f".into(),
                permission: "p".into()
            }
            .http_status_code(),
            403
        );
        assert_eq!(FieldkitError::DeviceNotFound("AA".into()).http_status_code(), 404);
        assert_eq!(FieldkitError::DeviceNotAvailable("AA".into()).http_status_code(), 409);
        assert_eq!(FieldkitError::ConfigParseError("e".into()).http_status_code(), 422);
        assert_eq!(FieldkitError::PersistenceError("e".into()).http_status_code(), 500);
        assert_eq!(
            FieldkitError::ConnectFailed {
                id: "AA".into(),
                message: "m".into()
            }
            .http_status_code(),
            502
        );
        assert_eq!(FieldkitError::WifiUnavailable("e".into()).http_status_code(), 503);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            FieldkitError::BluetoothAdapterNotFound.error_code(),
            "BLUETOOTH_ADAPTER_NOT_FOUND"
        );
        assert_eq!(FieldkitError::InvalidZipcode("x".into()).error_code(), "INVALID_ZIPCODE");
        assert_eq!(
            FieldkitError::ConfigNotFound(PathBuf::new()).error_code(),
            "CONFIG_NOT_FOUND"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: FieldkitError = io_err.into();
        assert!(matches!(err, FieldkitError::IoError(_)));
    }

    #[test]
    fn test_from_bluetooth_error_keeps_message() {
        let err: FieldkitError = crate::ble::BluetoothError::ConnectFailed {
            id: "AA:BB:CC:DD:EE:FF".into(),
            message: "GATT discovery aborted".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Failed to connect: GATT discovery aborted");
    }

    #[test]
    fn test_error_display_messages() {
        assert_eq!(FieldkitError::InvalidZipcode("00000".into()).to_string(), "Invalid zipcode");
        let err = FieldkitError::PermissionRequired {
            feature: "barcode scanning".into(),
            permission: "Camera".into(),
        };
        assert_eq!(err.to_string(), "Camera permission is required to use barcode scanning");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<FieldkitError>();
        assert_sync::<FieldkitError>();
    }
}
