//! Permission gates.
//!
//! Each feature needs a fixed set of platform permissions before it may run.
//! Grants come from [`PermissionsConfig`]; a missing grant short-circuits the
//! feature with [`FieldkitError::PermissionRequired`].

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::PermissionsConfig;
use crate::error::{FieldkitError, Result};

/// First platform API level with separate Bluetooth scan/connect permissions.
pub const BLUETOOTH_RUNTIME_PERMISSIONS_API_LEVEL: u32 = 31;

/// A platform permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Fine location.
    Location,
    /// Bluetooth scanning.
    BluetoothScan,
    /// Bluetooth connections.
    BluetoothConnect,
    /// Camera access.
    Camera,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Location => "Location",
            Self::BluetoothScan => "Bluetooth scan",
            Self::BluetoothConnect => "Bluetooth connect",
            Self::Camera => "Camera",
        })
    }
}

/// A gated feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Weather for the last known position.
    CurrentLocationWeather,
    /// BLE scanning and connections.
    Bluetooth,
    /// Wi-Fi scanning.
    Wifi,
    /// Barcode scanning and history.
    Barcode,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CurrentLocationWeather => "current location weather",
            Self::Bluetooth => "Bluetooth",
            Self::Wifi => "Wi-Fi scanning",
            Self::Barcode => "barcode scanning",
        })
    }
}

impl Feature {
    /// Permissions this feature needs on a platform at `api_level`.
    #[must_use]
    pub const fn required_permissions(self, api_level: u32) -> &'static [Permission] {
        match self {
            Self::CurrentLocationWeather | Self::Wifi => &[Permission::Location],
            Self::Bluetooth if api_level < BLUETOOTH_RUNTIME_PERMISSIONS_API_LEVEL => {
                &[Permission::Location]
            }
            Self::Bluetooth => &[
                Permission::BluetoothScan,
                Permission::BluetoothConnect,
                Permission::Location,
            ],
            Self::Barcode => &[Permission::Camera],
        }
    }
}

impl PermissionsConfig {
    /// Whether `permission` has been granted.
    #[must_use]
    pub const fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::Location => self.location,
            Permission::BluetoothScan => self.bluetooth_scan,
            Permission::BluetoothConnect => self.bluetooth_connect,
            Permission::Camera => self.camera,
        }
    }

    /// Check every permission `feature` needs.
    ///
    /// # Errors
    ///
    /// Returns [`FieldkitError::PermissionRequired`] naming the first missing grant.
    pub fn require(&self, feature: Feature) -> Result<()> {
        match feature
            .required_permissions(self.platform_api_level)
            .iter()
            .find(|permission| !self.is_granted(**permission))
        {
            Some(missing) => {
                tracing::debug!(%feature, permission = %missing, "Permission gate closed");
                Err(FieldkitError::PermissionRequired {
                    feature: feature.to_string(),
                    permission: missing.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_requirements_depend_on_api_level() {
        assert_eq!(
            Feature::Bluetooth.required_permissions(30),
            &[Permission::Location]
        );
        assert_eq!(
            Feature::Bluetooth.required_permissions(31),
            &[
                Permission::BluetoothScan,
                Permission::BluetoothConnect,
                Permission::Location
            ]
        );
    }

    #[test]
    fn test_all_granted_by_default() {
        let grants = PermissionsConfig::default();
        for feature in [
            Feature::CurrentLocationWeather,
            Feature::Bluetooth,
            Feature::Wifi,
            Feature::Barcode,
        ] {
            assert!(grants.require(feature).is_ok());
        }
    }

    #[test]
    fn test_denied_camera_blocks_barcodes_only() {
        let grants = PermissionsConfig {
            camera: false,
            ..PermissionsConfig::default()
        };
        let err = grants.require(Feature::Barcode).unwrap_err();
        assert_eq!(err.to_string(), "Camera permission is required to use barcode scanning");
        assert!(grants.require(Feature::Wifi).is_ok());
    }

    #[test]
    fn test_legacy_bluetooth_ignores_scan_grant() {
        let grants = PermissionsConfig {
            bluetooth_scan: false,
            bluetooth_connect: false,
            platform_api_level: 29,
            ..PermissionsConfig::default()
        };
        assert!(grants.require(Feature::Bluetooth).is_ok());

        let modern = PermissionsConfig {
            platform_api_level: 33,
            ..grants
        };
        assert!(matches!(
            modern.require(Feature::Bluetooth),
            Err(FieldkitError::PermissionRequired { ref permission, .. }) if permission == "Bluetooth scan"
        ));
    }
}
