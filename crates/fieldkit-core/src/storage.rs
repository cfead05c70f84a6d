//! Persistent key-value storage.
//!
//! Each key maps to one JSON document at `<data_dir>/<key>.json`. Keys are
//! fixed identifiers such as `zipcode-storage`; they never come from users.

use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("storage key pattern is valid")
});

/// Storage backend for fieldkit data.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a new storage instance rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Directory holding the stored documents.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Read the raw document stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys or unreadable files.
    pub fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        let path = self.key_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the document stored under `key`.
    ///
    /// The value is written to a sibling temp file and renamed into place so
    /// readers never observe a partial document.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys or failed writes.
    pub fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.key_path(key)?;
        std::fs::create_dir_all(&self.data_dir)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)
    }

    fn key_path(&self, key: &str) -> io::Result<PathBuf> {
        if !KEY_PATTERN.is_match(key) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key '{key}'"),
            ));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

/// Get the default storage location.
///
/// On Linux: `/var/lib/fieldkit/`
/// Elsewhere: the platform data dir, e.g. `~/.local/share/fieldkit/`
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Some(PathBuf::from("/var/lib/fieldkit"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "fieldkit").map(|dirs| dirs.data_dir().to_path_buf())
    }
}
