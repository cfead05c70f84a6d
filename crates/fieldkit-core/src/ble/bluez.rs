//! BlueZ-backed central (Linux, via `bluer`).

use std::time::Duration;

use bluer::{Adapter, AdapterEvent, Address, Device, Session};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{BleCentral, BluetoothError, CharacteristicInfo, GattProfile, ServiceInfo, Sighting};

/// How often to check whether BlueZ has finished resolving services.
const SERVICES_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Central on the default BlueZ adapter.
#[derive(Debug)]
pub struct BluezCentral {
    adapter: Adapter,
}

impl BluezCentral {
    /// Open a D-Bus session and take the default adapter.
    ///
    /// # Errors
    ///
    /// Fails if BlueZ is unreachable, there is no adapter, or it is powered off.
    pub async fn new() -> Result<Self, BluetoothError> {
        let session = Session::new()
            .await
            .map_err(|e| BluetoothError::SessionInitFailed { message: e.to_string() })?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|_| BluetoothError::AdapterNotFound)?;

        let powered = adapter
            .is_powered()
            .await
            .map_err(|e| BluetoothError::SessionInitFailed { message: e.to_string() })?;
        if !powered {
            return Err(BluetoothError::AdapterPoweredOff);
        }

        info!(adapter = adapter.name(), "Using Bluetooth adapter");
        Ok(Self { adapter })
    }

    fn device(&self, id: &str) -> Result<Device, BluetoothError> {
        let address: Address = id.parse().map_err(|_| BluetoothError::InvalidAddress {
            address: id.to_string(),
        })?;
        self.adapter
            .device(address)
            .map_err(|_| BluetoothError::DeviceNotFound { id: id.to_string() })
    }

    async fn sighting(&self, address: Address) -> Option<Sighting> {
        let device = self.adapter.device(address).ok()?;
        let name = device.name().await.ok().flatten();
        let connected = device.is_connected().await.unwrap_or(false);
        Some(Sighting {
            id: address.to_string(),
            name,
            connected,
        })
    }
}

/// Address to re-read for `event`.
///
/// With change tracking, BlueZ repeats `DeviceAdded` whenever a device's
/// properties change, so a name from a later scan response or a new
/// connection shows up as a fresh sighting.
const fn sighted_address(event: &AdapterEvent) -> Option<Address> {
    match event {
        AdapterEvent::DeviceAdded(address) => Some(*address),
        _ => None,
    }
}

impl BleCentral for BluezCentral {
    async fn scan(&self, sightings: mpsc::Sender<Sighting>) -> Result<(), BluetoothError> {
        let events = self
            .adapter
            .discover_devices_with_changes()
            .await
            .map_err(|e| BluetoothError::ScanFailed { message: e.to_string() })?;
        let mut events = std::pin::pin!(events);

        loop {
            tokio::select! {
                () = sightings.closed() => {
                    debug!("Scan receiver dropped");
                    return Ok(());
                }
                event = events.next() => match event {
                    Some(event) => {
                        let Some(address) = sighted_address(&event) else {
                            continue;
                        };
                        if let Some(sighting) = self.sighting(address).await {
                            if sightings.send(sighting).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    async fn connect(&self, id: &str) -> Result<GattProfile, BluetoothError> {
        let device = self.device(id)?;
        device.connect().await.map_err(|e| BluetoothError::ConnectFailed {
            id: id.to_string(),
            message: e.to_string(),
        })?;

        read_profile(&device).await.map_err(|e| match e {
            BluetoothError::DiscoveryFailed { message } => BluetoothError::ConnectFailed {
                id: id.to_string(),
                message,
            },
            other => other,
        })
    }

    async fn discover(&self, id: &str) -> Result<GattProfile, BluetoothError> {
        let device = self.device(id)?;
        read_profile(&device).await
    }
}

fn discovery_failed(e: &bluer::Error) -> BluetoothError {
    BluetoothError::DiscoveryFailed {
        message: e.to_string(),
    }
}

async fn read_profile(device: &Device) -> Result<GattProfile, BluetoothError> {
    while !device
        .is_services_resolved()
        .await
        .map_err(|e| discovery_failed(&e))?
    {
        if !device.is_connected().await.map_err(|e| discovery_failed(&e))? {
            return Err(BluetoothError::DiscoveryFailed {
                message: "device disconnected before services were resolved".to_string(),
            });
        }
        tokio::time::sleep(SERVICES_POLL_INTERVAL).await;
    }

    let mut profile = GattProfile::default();
    for service in device.services().await.map_err(|e| discovery_failed(&e))? {
        let service_uuid = service.uuid().await.map_err(|e| discovery_failed(&e))?;
        let primary = service.primary().await.map_err(|e| discovery_failed(&e))?;
        profile.services.push(ServiceInfo {
            uuid: service_uuid,
            primary,
        });

        for characteristic in service
            .characteristics()
            .await
            .map_err(|e| discovery_failed(&e))?
        {
            let uuid = characteristic.uuid().await.map_err(|e| discovery_failed(&e))?;
            let flags = characteristic.flags().await.map_err(|e| discovery_failed(&e))?;
            profile.characteristics.push(CharacteristicInfo {
                uuid,
                service_uuid,
                readable: flags.read,
                writable_with_response: flags.write,
                writable_without_response: flags.write_without_response,
                notifiable: flags.notify,
            });
        }
    }

    debug!(
        services = profile.services.len(),
        characteristics = profile.characteristics.len(),
        "Read GATT profile"
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_device_event_is_resighted() {
        let address = Address::new([0xC4, 0x7C, 0x8D, 0x6A, 0x3E, 0x21]);
        assert_eq!(sighted_address(&AdapterEvent::DeviceAdded(address)), Some(address));
        assert_eq!(sighted_address(&AdapterEvent::DeviceRemoved(address)), None);
    }
}
