//! Detail views for a selected device or network.
//!
//! A list view hands its selection to a detail view as a JSON payload. The
//! payload is schema-checked on receipt (unknown fields rejected, identifiers
//! validated). A missing payload is not an error; it decodes to `None`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::ble::Peripheral;
use crate::wifi::WifiNetwork;

static BSSID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("BSSID pattern is valid")
});

/// Longest accepted device identifier.
const MAX_DEVICE_ID_LEN: usize = 64;

/// Errors raised while decoding a detail payload.
#[derive(Debug, thiserror::Error)]
pub enum DetailError {
    /// Not valid JSON, or not the expected shape.
    #[error("Malformed detail payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-formed but a field failed validation.
    #[error("Invalid {field}: {message}")]
    InvalidField {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// A payload that can be passed to a detail view.
pub trait DetailPayload: Serialize + DeserializeOwned {
    /// Check field contents beyond what the schema enforces.
    ///
    /// # Errors
    ///
    /// Returns [`DetailError::InvalidField`] for the first bad field.
    fn validate(&self) -> Result<(), DetailError>;
}

/// Decode and validate a payload. An absent or blank parameter yields `None`.
///
/// # Errors
///
/// Returns an error if the payload is malformed or fails validation.
pub fn decode<T: DetailPayload>(raw: Option<&str>) -> Result<Option<T>, DetailError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };
    let payload: T = serde_json::from_str(raw)?;
    payload.validate()?;
    Ok(Some(payload))
}

/// A GATT service as shown in the device detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ServiceDetail {
    /// Service UUID.
    pub uuid: Uuid,
}

/// A characteristic as shown in the device detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CharacteristicDetail {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Owning service.
    pub service_uuid: Uuid,
    /// Supports reads.
    pub readable: bool,
    /// Supports writes with response.
    pub writable: bool,
}

/// Services and characteristics of a BLE peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DeviceDetail {
    /// Platform identifier.
    pub id: String,
    /// Advertised name.
    pub name: String,
    /// Services, empty until connected.
    pub services: Vec<ServiceDetail>,
    /// Characteristics, empty until connected.
    pub characteristics: Vec<CharacteristicDetail>,
}

impl DetailPayload for DeviceDetail {
    fn validate(&self) -> Result<(), DetailError> {
        if self.id.is_empty() || self.id.len() > MAX_DEVICE_ID_LEN {
            return Err(DetailError::InvalidField {
                field: "id",
                message: format!("must be 1-{MAX_DEVICE_ID_LEN} characters"),
            });
        }
        if self.id.chars().any(char::is_whitespace) {
            return Err(DetailError::InvalidField {
                field: "id",
                message: "must not contain whitespace".to_string(),
            });
        }
        let known: Vec<Uuid> = self.services.iter().map(|s| s.uuid).collect();
        if let Some(orphan) = self
            .characteristics
            .iter()
            .find(|c| !known.contains(&c.service_uuid))
        {
            return Err(DetailError::InvalidField {
                field: "characteristics",
                message: format!("{} belongs to unknown service {}", orphan.uuid, orphan.service_uuid),
            });
        }
        Ok(())
    }
}

impl From<&Peripheral> for DeviceDetail {
    fn from(peripheral: &Peripheral) -> Self {
        let profile = peripheral.profile.clone().unwrap_or_default();
        Self {
            id: peripheral.id.clone(),
            name: peripheral.name.clone(),
            services: profile
                .services
                .iter()
                .map(|s| ServiceDetail { uuid: s.uuid })
                .collect(),
            characteristics: profile
                .characteristics
                .iter()
                .map(|c| CharacteristicDetail {
                    uuid: c.uuid,
                    service_uuid: c.service_uuid,
                    readable: c.readable,
                    writable: c.writable_with_response,
                })
                .collect(),
        }
    }
}

/// A scanned Wi-Fi network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NetworkDetail {
    /// Network name.
    pub ssid: String,
    /// Access point MAC address.
    pub bssid: String,
    /// Security description.
    pub capabilities: String,
    /// Channel frequency in MHz.
    pub frequency: u32,
    /// Signal level in dBm.
    pub level: i32,
    /// When the access point was observed.
    pub timestamp: DateTime<Utc>,
}

impl DetailPayload for NetworkDetail {
    fn validate(&self) -> Result<(), DetailError> {
        if !BSSID_PATTERN.is_match(&self.bssid) {
            return Err(DetailError::InvalidField {
                field: "bssid",
                message: format!("'{}' is not a MAC address", self.bssid),
            });
        }
        if self.ssid.trim().is_empty() {
            return Err(DetailError::InvalidField {
                field: "ssid",
                message: "must not be blank".to_string(),
            });
        }
        Ok(())
    }
}

impl From<&WifiNetwork> for NetworkDetail {
    fn from(network: &WifiNetwork) -> Self {
        Self {
            ssid: network.ssid.clone(),
            bssid: network.bssid.clone(),
            capabilities: network.capabilities.clone(),
            frequency: network.frequency,
            level: network.level,
            timestamp: network.timestamp,
        }
    }
}
