//! Bounded, persisted histories.
//!
//! A history is a capped sequence stored as a JSON array under a fixed
//! storage key. Entries are ordered most-recent-first; pushing past the cap
//! evicts the oldest entry. Storage failures are logged and swallowed: a
//! missing or corrupt document reads as an empty history.

use std::marker::PhantomData;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::barcode::BarcodeRecord;
use crate::storage::Storage;

/// Storage key for searched zipcodes.
pub const ZIPCODE_STORAGE_KEY: &str = "zipcode-storage";

/// Storage key for barcode scans.
pub const BARCODE_STORAGE_KEY: &str = "barcode-storage";

/// Default number of entries kept per history.
pub const MAX_HISTORY_ITEMS: usize = 5;

/// A capped, most-recent-first history persisted under one key.
pub struct BoundedHistory<T> {
    storage: Storage,
    key: &'static str,
    limit: usize,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
    _entries: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for BoundedHistory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedHistory")
            .field("key", &self.key)
            .field("limit", &self.limit)
            .field("data_dir", &self.storage.data_dir())
            .finish()
    }
}

impl BoundedHistory<String> {
    /// The zipcode search history.
    #[must_use]
    pub fn zipcodes(storage: Storage, limit: usize) -> Self {
        Self::new(storage, ZIPCODE_STORAGE_KEY, limit)
    }
}

impl BoundedHistory<BarcodeRecord> {
    /// The barcode scan history.
    #[must_use]
    pub fn barcodes(storage: Storage, limit: usize) -> Self {
        Self::new(storage, BARCODE_STORAGE_KEY, limit)
    }
}

impl<T: Serialize + DeserializeOwned> BoundedHistory<T> {
    /// Create a history stored under `key`, keeping at most `limit` entries.
    #[must_use]
    pub fn new(storage: Storage, key: &'static str, limit: usize) -> Self {
        Self {
            storage,
            key,
            limit: limit.max(1),
            write_lock: Mutex::new(()),
            _entries: PhantomData,
        }
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// All stored entries, most recent first.
    ///
    /// Returns an empty list if nothing is stored or the document is unreadable.
    #[must_use]
    pub fn entries(&self) -> Vec<T> {
        let raw = match self.storage.get_item(self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = self.key, error = %e, "Failed to read history");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key = self.key, error = %e, "Discarding unreadable history");
                Vec::new()
            }
        }
    }

    /// Record `entry` as the most recent, evicting the oldest past the limit.
    ///
    /// Returns the history as it now stands.
    pub fn push(&self, entry: T) -> Vec<T> {
        let _guard = self.write_lock.lock();
        let mut entries = self.entries();
        insert_most_recent(&mut entries, entry, self.limit);
        self.write(&entries);
        entries
    }

    /// Like [`push`](Self::push), but a value already present is left where it is.
    ///
    /// Returns `true` if the entry was added.
    pub fn push_unique(&self, entry: T) -> bool
    where
        T: PartialEq,
    {
        let _guard = self.write_lock.lock();
        let mut entries = self.entries();
        if entries.contains(&entry) {
            debug!(key = self.key, "History entry already present");
            return false;
        }
        insert_most_recent(&mut entries, entry, self.limit);
        self.write(&entries);
        true
    }

    fn write(&self, entries: &[T]) {
        let result = serde_json::to_string(entries)
            .map_err(std::io::Error::other)
            .and_then(|json| self.storage.set_item(self.key, &json));
        if let Err(e) = result {
            warn!(key = self.key, error = %e, "Failed to persist history");
        }
    }
}

/// Insert at the front and drop entries beyond `limit` from the back.
fn insert_most_recent<T>(entries: &mut Vec<T>, entry: T, limit: usize) {
    entries.insert(0, entry);
    entries.truncate(limit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::Symbology;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn zipcodes(dir: &TempDir) -> BoundedHistory<String> {
        BoundedHistory::zipcodes(Storage::new(dir.path()), MAX_HISTORY_ITEMS)
    }

    #[test]
    fn test_empty_when_absent() {
        let dir = TempDir::new().unwrap();
        assert!(zipcodes(&dir).entries().is_empty());
    }

    #[test]
    fn test_sixth_entry_evicts_oldest() {
        let dir = TempDir::new().unwrap();
        let history = zipcodes(&dir);
        for zip in ["10001", "10002", "10003", "10004", "10005", "10006"] {
            history.push(zip.to_string());
        }

        let entries = history.entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries, vec!["10006", "10005", "10004", "10003", "10002"]);
        assert!(!entries.contains(&"10001".to_string()));
    }

    #[test]
    fn test_push_unique_skips_duplicates() {
        let dir = TempDir::new().unwrap();
        let history = zipcodes(&dir);
        assert!(history.push_unique("10001".to_string()));
        assert!(history.push_unique("94103".to_string()));
        assert!(!history.push_unique("10001".to_string()));
        assert_eq!(history.entries(), vec!["94103", "10001"]);
    }

    #[test]
    fn test_corrupt_document_reads_empty() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        storage.set_item(ZIPCODE_STORAGE_KEY, "{not json").unwrap();

        let history = BoundedHistory::zipcodes(storage, MAX_HISTORY_ITEMS);
        assert!(history.entries().is_empty());

        history.push("10001".to_string());
        assert_eq!(history.entries(), vec!["10001"]);
    }

    #[test]
    fn test_barcode_round_trip_is_field_identical() {
        let dir = TempDir::new().unwrap();
        let history = BoundedHistory::barcodes(Storage::new(dir.path()), MAX_HISTORY_ITEMS);
        let record = BarcodeRecord::scanned_at(
            Symbology::Ean13,
            "4006381333931",
            Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap()
                + chrono::Duration::nanoseconds(123_456_789),
        )
        .unwrap();

        history.push(record.clone());
        let stored = history.entries();
        assert_eq!(stored, vec![record]);
    }

    #[test]
    fn test_histories_are_independent() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        let zips = BoundedHistory::zipcodes(storage.clone(), MAX_HISTORY_ITEMS);
        let codes = BoundedHistory::barcodes(storage, MAX_HISTORY_ITEMS);

        zips.push("10001".to_string());
        assert!(codes.entries().is_empty());
    }

    #[test]
    fn test_unwritable_storage_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let history = BoundedHistory::zipcodes(Storage::new(&blocker), MAX_HISTORY_ITEMS);
        let entries = history.push("10001".to_string());
        assert_eq!(entries, vec!["10001"]);
        assert!(history.entries().is_empty());
    }
}
