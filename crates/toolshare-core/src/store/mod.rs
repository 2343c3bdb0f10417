//! Synchronous key/value persistence, one JSON document per key.
//!
//! Writes are last-write-wins and either land completely or leave the
//! previous document in place. Failures are returned to the caller; nothing
//! is retried or queued.

mod file;
mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

/// Browser-style default budget shared by all keys of one store.
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage quota exceeded writing {key}: needs {needed} bytes, {available} available")]
    OutOfSpace {
        key: String,
        needed: u64,
        available: u64,
    },

    #[error("Serialization error for {key}: {message}")]
    Serialization { key: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned: {message}")]
    LockPoisoned { message: String },
}

impl StoreError {
    pub fn serialization(key: &str, message: impl ToString) -> Self {
        Self::Serialization {
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub fn lock_poisoned(message: impl Into<String>) -> Self {
        Self::LockPoisoned {
            message: message.into(),
        }
    }

    pub fn is_out_of_space(&self) -> bool {
        matches!(self, Self::OutOfSpace { .. })
    }
}

pub trait DurableStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Remove `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Every stored key, sorted.
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Bytes currently charged against the quota.
    fn used_bytes(&self) -> Result<u64, StoreError>;
}

/// Typed access on top of [`DurableStore`].
pub trait DurableStoreExt: DurableStore {
    fn read_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.read(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::serialization(key, e)),
            None => Ok(None),
        }
    }

    fn write_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::serialization(key, e))?;
        self.write(key, &value)
    }
}

impl<S: DurableStore + ?Sized> DurableStoreExt for S {}

/// Bytes charged against the quota for one entry.
fn entry_size(key: &str, encoded_len: usize) -> u64 {
    (key.len() + encoded_len) as u64
}

fn check_quota(key: &str, quota: Option<u64>, used: u64, needed: u64) -> Result<(), StoreError> {
    match quota {
        Some(limit) if used.saturating_add(needed) > limit => Err(StoreError::OutOfSpace {
            key: key.to_string(),
            needed,
            available: limit.saturating_sub(used),
        }),
        _ => Ok(()),
    }
}
