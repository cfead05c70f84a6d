//! Scan sessions and connect attempts.
//!
//! A scan runs as two tasks joined by a channel: the central's scan loop
//! produces [`Sighting`]s and a single consumer folds them into the shared
//! [`BleReconciler`] in arrival order. The reconciler lock is never held
//! across an `.await`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::reconciler::{BleReconciler, DiscoverySnapshot, SightingOutcome};
use super::{BleCentral, BluetoothError, Peripheral, Sighting};

/// Sightings buffered between the scan loop and the consumer.
const SIGHTING_BUFFER: usize = 64;

/// BLE discovery state plus the central that feeds it.
pub struct BleDiscovery<C> {
    state: Arc<Mutex<BleReconciler>>,
    central: Arc<C>,
}

impl<C> Clone for BleDiscovery<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            central: Arc::clone(&self.central),
        }
    }
}

impl<C> std::fmt::Debug for BleDiscovery<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleDiscovery")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<C: BleCentral> BleDiscovery<C> {
    /// Wrap `central` with empty discovery state.
    #[must_use]
    pub fn new(central: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(BleReconciler::new())),
            central: Arc::new(central),
        }
    }

    /// Current connected/available/connecting view.
    #[must_use]
    pub fn snapshot(&self) -> DiscoverySnapshot {
        self.state.lock().snapshot()
    }

    /// Look up a known peripheral.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<Peripheral> {
        self.state.lock().find(id).cloned()
    }

    /// Fold one sighting into the state.
    ///
    /// Profile reads for newly seen connected peripherals are spawned onto
    /// `profiles` so a slow device never holds up later sightings.
    fn fold(&self, sighting: Sighting, profiles: &mut JoinSet<()>) {
        let outcome = self.state.lock().observe(&sighting);
        match outcome {
            SightingOutcome::Ignored => {}
            SightingOutcome::AddedAvailable => {
                debug!(id = %sighting.id, "Peripheral available");
            }
            SightingOutcome::NeedsProfile => {
                let discovery = self.clone();
                profiles.spawn(async move { discovery.record_connected(sighting).await });
            }
        }
    }

    /// Read the GATT profile of a connected sighting and record it.
    ///
    /// A profile that cannot be read is logged; the peripheral is still
    /// recorded as connected, without a profile.
    async fn record_connected(&self, sighting: Sighting) {
        let _pending = PendingProfile::new(Arc::clone(&self.state), &sighting.id);
        debug!(id = %sighting.id, "Reading profile of connected peripheral");

        let profile = match self.central.discover(&sighting.id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(id = %sighting.id, error = %e, "Failed to read GATT profile");
                None
            }
        };
        let name = sighting.display_name().unwrap_or_default().to_string();
        let peripheral = Peripheral::connected(sighting.id, name, profile);
        let id = peripheral.id.clone();
        if self.state.lock().insert_connected(peripheral) {
            info!(id = %id, "Recorded connected peripheral");
        }
    }

    /// Drain `sightings` until the channel closes and every profile read
    /// it started has finished. Dropping the future aborts those reads.
    pub async fn run_consumer(&self, mut sightings: mpsc::Receiver<Sighting>) {
        let mut profiles = JoinSet::new();
        loop {
            tokio::select! {
                sighting = sightings.recv() => match sighting {
                    Some(sighting) => self.fold(sighting, &mut profiles),
                    None => break,
                },
                Some(joined) = profiles.join_next(), if !profiles.is_empty() => {
                    log_profile_task(joined);
                }
            }
        }
        debug!("Sighting channel closed");

        while let Some(joined) = profiles.join_next().await {
            log_profile_task(joined);
        }
    }

    /// Connect to an available peripheral and read its profile.
    ///
    /// On success the peripheral moves to `connected`. On failure it stays
    /// available. The in-flight marker is cleared on every exit path,
    /// including cancellation of the returned future.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown, not available, already being connected, or
    /// if the central fails to connect or read the profile.
    pub async fn connect(&self, id: &str) -> Result<Peripheral, BluetoothError> {
        let (name, _in_flight) = {
            let mut state = self.state.lock();
            let name = state.begin_connect(id)?;
            (name, InFlight::new(Arc::clone(&self.state), id))
        };
        info!(id, name = %name, "Connecting");

        match self.central.connect(id).await {
            Ok(profile) => {
                let peripheral = self.state.lock().promote(id, name, profile);
                info!(id, "Connected");
                Ok(peripheral)
            }
            Err(e) => {
                warn!(id, error = %e, "Connect attempt failed");
                Err(e)
            }
        }
    }

    /// Start scanning. Dropping the returned session stops it.
    #[must_use]
    pub fn start_scan(&self) -> ScanSession {
        let (tx, rx) = mpsc::channel(SIGHTING_BUFFER);

        let central = Arc::clone(&self.central);
        let producer = tokio::spawn(async move {
            if let Err(e) = central.scan(tx).await {
                error!(error = %e, "BLE scan stopped");
            }
        });

        let discovery = self.clone();
        let consumer = tokio::spawn(async move { discovery.run_consumer(rx).await });

        info!("BLE scan started");
        ScanSession {
            producer,
            consumer,
            started_at: Utc::now(),
        }
    }
}

/// Clears a connect attempt's in-flight marker when dropped.
struct InFlight {
    state: Arc<Mutex<BleReconciler>>,
    id: String,
}

impl InFlight {
    fn new(state: Arc<Mutex<BleReconciler>>, id: &str) -> Self {
        Self {
            state,
            id: id.to_string(),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state.lock().finish_connect(&self.id);
    }
}

/// Releases a profile-read marker that never reached `insert_connected`.
struct PendingProfile {
    state: Arc<Mutex<BleReconciler>>,
    id: String,
}

impl PendingProfile {
    fn new(state: Arc<Mutex<BleReconciler>>, id: &str) -> Self {
        Self {
            state,
            id: id.to_string(),
        }
    }
}

impl Drop for PendingProfile {
    fn drop(&mut self) {
        self.state.lock().abandon_profile(&self.id);
    }
}

fn log_profile_task(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Profile read panicked");
        }
    }
}

/// A running scan. Dropping it aborts the scan loop, the consumer and any
/// profile reads still in flight.
#[derive(Debug)]
pub struct ScanSession {
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl ScanSession {
    /// When the scan started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `true` once the scan loop has ended on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished()
    }

    /// Stop scanning.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.producer.abort();
        self.consumer.abort();
        debug!("BLE scan session released");
    }
}
