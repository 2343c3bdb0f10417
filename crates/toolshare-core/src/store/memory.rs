use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{DurableStore, StoreError, check_quota, entry_size};

/// Process-local store. Documents are kept encoded so reads never alias the
/// caller's values and quota accounting matches [`super::JsonFileStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }
}

impl DurableStore for InMemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::lock_poisoned("entries"))?;
        entries
            .get(key)
            .map(|encoded| serde_json::from_str(encoded).map_err(|e| StoreError::serialization(key, e)))
            .transpose()
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value).map_err(|e| StoreError::serialization(key, e))?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::lock_poisoned("entries"))?;

        let used: u64 = entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, encoded)| entry_size(existing, encoded.len()))
            .sum();
        check_quota(key, self.quota, used, entry_size(key, encoded.len()))?;

        entries.insert(key.to_string(), encoded);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::lock_poisoned("entries"))?
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::lock_poisoned("entries"))?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn used_bytes(&self) -> Result<u64, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::lock_poisoned("entries"))?;
        Ok(entries
            .iter()
            .map(|(key, encoded)| entry_size(key, encoded.len()))
            .sum())
    }
}
