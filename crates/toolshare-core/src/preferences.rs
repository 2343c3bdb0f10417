use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bus::DEFAULT_CHANNEL_CAPACITY;
use crate::error::Error;
use crate::notify::{PermissionState, TransportKind};
use crate::store::DEFAULT_QUOTA_BYTES;
use crate::utils::AppPaths;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub store: StorePreferences,

    #[serde(default)]
    pub notifications: NotificationPreferences,

    #[serde(default)]
    pub bus: BusPreferences,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorePreferences {
    /// Overrides the platform data directory.
    pub directory: Option<PathBuf>,
    /// Total budget for all stored documents. `0` disables the limit.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,
}

impl StorePreferences {
    pub fn quota(&self) -> Option<u64> {
        (self.quota_bytes > 0).then_some(self.quota_bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NotificationPreferences {
    #[serde(default)]
    pub transport: TransportKind,
    /// Permission the gateway starts from. `default` asks on first use.
    #[serde(default)]
    pub permission: PermissionState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusPreferences {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_quota_bytes() -> u64 {
    DEFAULT_QUOTA_BYTES
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for StorePreferences {
    fn default() -> Self {
        Self {
            directory: None,
            quota_bytes: default_quota_bytes(),
        }
    }
}

impl Default for BusPreferences {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Preferences {
    /// Get the path to the preferences file
    pub fn config_path() -> Result<PathBuf, Error> {
        AppPaths::preferences_file().ok_or_else(|| {
            Error::Configuration("Could not determine config directory".to_string())
        })
    }

    /// Load preferences from disk, or return defaults if not found
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        match toml::from_str(&contents) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse preferences file at {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Write preferences to `path`, creating missing parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            Error::Configuration(format!("Failed to serialize preferences: {e}"))
        })?;

        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Directory of the durable store: the configured override, else the
    /// platform data directory.
    pub fn store_dir(&self) -> Result<PathBuf, Error> {
        self.store
            .directory
            .clone()
            .or_else(AppPaths::default_store_dir)
            .ok_or_else(|| Error::Configuration("Could not determine data directory".to_string()))
    }
}
