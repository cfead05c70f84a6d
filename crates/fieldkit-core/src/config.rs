//! Application configuration management.
//!
//! Handles loading, saving, and validating fieldkit configuration including:
//! - HTTP bind address and port
//! - Weather provider endpoint
//! - Data directory and history size
//! - Permission grants and platform API level
//! - Display timezone for relative dates
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `FIELDKIT__SECTION__KEY` environment variables.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "FIELDKIT";

/// Upper bound for `storage.history_limit`.
pub const MAX_HISTORY_LIMIT: usize = 50;

/// Errors that can occur while loading, saving, or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was required but does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// Path that was written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The layered configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] ::config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field failed validation.
    #[error("Invalid {field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Weather provider settings.
    pub weather: WeatherConfig,

    /// Persistence settings.
    pub storage: StorageConfig,

    /// Permission grants.
    pub permissions: PermissionsConfig,

    /// Presentation settings.
    pub display: DisplayConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind.
    pub bind_address: String,

    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Weather provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL of the `?format=j1` weather provider.
    pub base_url: String,

    /// Optional request timeout. When unset the HTTP client's defaults apply.
    pub request_timeout_secs: Option<u64>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wttr.in".to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding history files. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,

    /// Number of entries kept per history.
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            history_limit: crate::history::MAX_HISTORY_ITEMS,
        }
    }
}

/// Permission grants, one flag per platform permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PermissionsConfig {
    /// Fine location (Wi-Fi scans, legacy BLE scans, current-location weather).
    pub location: bool,

    /// Bluetooth scan (API level 31+).
    pub bluetooth_scan: bool,

    /// Bluetooth connect (API level 31+).
    pub bluetooth_connect: bool,

    /// Camera (barcode scanning).
    pub camera: bool,

    /// Platform API level deciding which Bluetooth permissions apply.
    pub platform_api_level: u32,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            location: true,
            bluetooth_scan: true,
            bluetooth_connect: true,
            camera: true,
            platform_api_level: crate::permissions::BLUETOOTH_RUNTIME_PERMISSIONS_API_LEVEL,
        }
    }
}

/// Presentation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// IANA timezone used to decide "Today" and "Tomorrow".
    pub timezone: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file, and the environment.
    ///
    /// A missing file is not an error; defaults and environment overrides apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result fails validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!(path = ?path, "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a file that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is absent.
    pub fn load_required(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::load(Some(path))
    }

    /// Save configuration to disk as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate every section, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the single error, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.server.bind_address.parse::<IpAddr>().is_err() {
            errors.push(ConfigError::ValidationError {
                field: "server.bind_address",
                message: format!("'{}' is not an IP address", self.server.bind_address),
            });
        }
        if self.server.port == 0 {
            errors.push(ConfigError::ValidationError {
                field: "server.port",
                message: "port must be non-zero".to_string(),
            });
        }

        match Url::parse(&self.weather.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ConfigError::ValidationError {
                field: "weather.base_url",
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ConfigError::ValidationError {
                field: "weather.base_url",
                message: e.to_string(),
            }),
        }
        if self.weather.request_timeout_secs == Some(0) {
            errors.push(ConfigError::ValidationError {
                field: "weather.request_timeout_secs",
                message: "timeout must be at least 1 second".to_string(),
            });
        }

        if !(1..=MAX_HISTORY_LIMIT).contains(&self.storage.history_limit) {
            errors.push(ConfigError::ValidationError {
                field: "storage.history_limit",
                message: format!("must be between 1 and {MAX_HISTORY_LIMIT}"),
            });
        }

        if !is_valid_timezone(&self.display.timezone) {
            errors.push(ConfigError::ValidationError {
                field: "display.timezone",
                message: format!("'{}' is not an IANA timezone", self.display.timezone),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// The display timezone, falling back to UTC.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.display.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// The directory holding persisted histories.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .or_else(crate::storage::default_data_dir)
            .unwrap_or_else(|| PathBuf::from("./data"))
    }

    /// `bind_address:port` for the HTTP listener.
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

/// Returns `true` if `name` is a known IANA timezone.
#[must_use]
pub fn is_valid_timezone(name: &str) -> bool {
    name.parse::<Tz>().is_ok()
}

/// Default location of the configuration file.
///
/// On Linux: `/etc/fieldkit/config.toml`
/// Elsewhere: the platform config dir, e.g. `~/Library/Application Support/fieldkit/config.toml`
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/fieldkit/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "fieldkit").map_or_else(
            || PathBuf::from("./config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.history_limit, 5);
        assert_eq!(config.weather.base_url, "https://wttr.in");
        assert!(config.weather.request_timeout_secs.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_required_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Config::load_required(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.server.port = 8088;
        config.permissions.camera = false;
        config.display.timezone = "America/New_York".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[permissions]\nlocation = false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.permissions.location);
        assert!(config.permissions.camera);
        assert_eq!(config.server.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.server.bind_address = "not-an-ip".to_string();
        config.weather.base_url = "ftp://example.com".to_string();
        config.storage.history_limit = 0;
        config.display.timezone = "Mars/Olympus".to_string();

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_single_validation_error() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError {
                field: "server.port",
                ..
            })
        ));
    }

    #[test]
    fn test_timezone_fallback() {
        let mut config = Config::default();
        config.display.timezone = "Europe/Berlin".to_string();
        assert_eq!(config.timezone(), chrono_tz::Europe::Berlin);
        config.display.timezone = "bogus".to_string();
        assert_eq!(config.timezone(), chrono_tz::UTC);
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/tmp/fieldkit-test"));
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/fieldkit-test"));
    }
}
