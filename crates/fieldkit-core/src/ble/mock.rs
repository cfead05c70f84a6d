//! In-memory BLE central.
//!
//! Used when the crate is built without `bluetooth`, with `mock-bluetooth`,
//! and in tests. Each device decides up front how connect attempts end.

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::{BleCentral, BluetoothError, CharacteristicInfo, GattProfile, ServiceInfo, Sighting};

/// How connect and discovery calls against a mock device end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Return the device's profile.
    Succeed,
    /// Fail with this message.
    Fail(String),
    /// Never complete.
    Hang,
}

/// A simulated peripheral.
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// Platform identifier.
    pub id: String,
    /// Advertised name.
    pub name: Option<String>,
    /// Reported as already connected.
    pub connected: bool,
    /// Profile returned on success.
    pub profile: GattProfile,
    /// Outcome of connect/discover calls.
    pub behavior: ConnectBehavior,
}

impl MockDevice {
    /// A named, unconnected device that connects successfully.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            connected: false,
            profile: GattProfile::default(),
            behavior: ConnectBehavior::Succeed,
        }
    }

    /// A device that advertises without a name.
    #[must_use]
    pub fn unnamed(id: impl Into<String>) -> Self {
        Self {
            name: None,
            ..Self::new(id, "")
        }
    }

    /// Report the device as already connected.
    #[must_use]
    pub const fn already_connected(mut self) -> Self {
        self.connected = true;
        self
    }

    /// Set the profile returned on success.
    #[must_use]
    pub fn with_profile(mut self, profile: GattProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Make connect and discovery fail with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = ConnectBehavior::Fail(message.into());
        self
    }

    /// Make connect and discovery never complete.
    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.behavior = ConnectBehavior::Hang;
        self
    }

    fn sighting(&self) -> Sighting {
        Sighting {
            id: self.id.clone(),
            name: self.name.clone(),
            connected: self.connected,
        }
    }
}

/// A central backed by a fixed device list.
#[derive(Debug, Clone, Default)]
pub struct MockCentral {
    devices: Vec<MockDevice>,
}

impl MockCentral {
    /// A central that reports `devices`, in order, on every scan.
    #[must_use]
    pub const fn new(devices: Vec<MockDevice>) -> Self {
        Self { devices }
    }

    /// A small demo set: two connectable sensors, a connected headset and
    /// an unnamed beacon.
    #[must_use]
    pub fn demo() -> Self {
        let heart_rate = sig_uuid(0x180d);
        let battery = sig_uuid(0x180f);
        let audio = sig_uuid(0x184e);

        Self::new(vec![
            MockDevice::new("C4:7C:8D:6A:3E:21", "Heart Rate Monitor").with_profile(GattProfile {
                services: vec![
                    ServiceInfo { uuid: heart_rate, primary: true },
                    ServiceInfo { uuid: battery, primary: true },
                ],
                characteristics: vec![
                    characteristic(sig_uuid(0x2a37), heart_rate, false, false, true),
                    characteristic(sig_uuid(0x2a39), heart_rate, false, true, false),
                    characteristic(sig_uuid(0x2a19), battery, true, false, true),
                ],
            }),
            MockDevice::new("D0:2B:20:11:9F:04", "Thermometer")
                .failing("le-connection-abort-by-local"),
            MockDevice::new("F8:4E:17:A2:55:C0", "Headphones")
                .already_connected()
                .with_profile(GattProfile {
                    services: vec![ServiceInfo { uuid: audio, primary: true }],
                    characteristics: vec![characteristic(sig_uuid(0x2bc3), audio, true, true, true)],
                }),
            MockDevice::unnamed("5A:91:3C:07:E2:DD"),
        ])
    }

    fn device(&self, id: &str) -> Result<&MockDevice, BluetoothError> {
        self.devices
            .iter()
            .find(|device| device.id == id)
            .ok_or_else(|| BluetoothError::DeviceNotFound { id: id.to_string() })
    }
}

impl BleCentral for MockCentral {
    async fn scan(&self, sightings: mpsc::Sender<Sighting>) -> Result<(), BluetoothError> {
        for device in &self.devices {
            if sightings.send(device.sighting()).await.is_err() {
                return Ok(());
            }
        }
        debug!(count = self.devices.len(), "Mock scan reported all devices");
        sightings.closed().await;
        Ok(())
    }

    async fn connect(&self, id: &str) -> Result<GattProfile, BluetoothError> {
        let device = self.device(id)?;
        match &device.behavior {
            ConnectBehavior::Succeed => Ok(device.profile.clone()),
            ConnectBehavior::Fail(message) => Err(BluetoothError::ConnectFailed {
                id: id.to_string(),
                message: message.clone(),
            }),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }

    async fn discover(&self, id: &str) -> Result<GattProfile, BluetoothError> {
        let device = self.device(id)?;
        match &device.behavior {
            ConnectBehavior::Succeed => Ok(device.profile.clone()),
            ConnectBehavior::Fail(message) => Err(BluetoothError::DiscoveryFailed {
                message: message.clone(),
            }),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Expand a 16-bit SIG-assigned number onto the Bluetooth base UUID.
#[allow(clippy::cast_lossless)]
const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

const fn characteristic(
    uuid: Uuid,
    service_uuid: Uuid,
    readable: bool,
    writable: bool,
    notifiable: bool,
) -> CharacteristicInfo {
    CharacteristicInfo {
        uuid,
        service_uuid,
        readable,
        writable_with_response: writable,
        writable_without_response: false,
        notifiable,
    }
}
