use std::path::PathBuf;

use toolshare_core::notify::{PermissionState, TransportKind};
use toolshare_core::preferences::Preferences;
use toolshare_core::{JsonFileStore, StoreError};

use crate::cli::Cli;
use crate::error::Error;

/// Command-line values that take precedence over preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub store_dir: Option<PathBuf>,
    pub quota_bytes: Option<u64>,
    pub notifications: Option<TransportKind>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            store_dir: cli.store_dir.clone(),
            quota_bytes: cli.quota_bytes,
            notifications: cli.notifications,
        }
    }
}

/// Effective runtime settings after merging overrides into preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_dir: PathBuf,
    pub quota: Option<u64>,
    pub transport: TransportKind,
    pub permission: PermissionState,
    pub channel_capacity: usize,
}

impl Settings {
    pub fn resolve(overrides: &Overrides, preferences: &Preferences) -> Result<Self, Error> {
        let store_dir = match &overrides.store_dir {
            Some(dir) => dir.clone(),
            None => preferences.store_dir()?,
        };
        let quota = match overrides.quota_bytes {
            Some(0) => None,
            Some(bytes) => Some(bytes),
            None => preferences.store.quota(),
        };

        Ok(Self {
            store_dir,
            quota,
            transport: overrides
                .notifications
                .unwrap_or(preferences.notifications.transport),
            permission: preferences.notifications.permission,
            channel_capacity: preferences.bus.channel_capacity,
        })
    }

    pub fn open_store(&self) -> Result<JsonFileStore, StoreError> {
        Ok(JsonFileStore::open(&self.store_dir)?.with_quota(self.quota))
    }
}
