use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::{DurableStore, StoreError, check_quota, entry_size};

const DOCUMENT_EXTENSION: &str = "json";
const PLAIN_PREFIX: &str = "k-";
const HASHED_PREFIX: &str = "h-";
/// Longest hex-encoded key kept verbatim in a file name. Leaves room for the
/// prefix and extension under the usual 255-byte name limit.
const MAX_PLAIN_HEX: usize = 200;

/// Directory-backed store.
///
/// A key is stored in `k-<hex(key)>.json`. Keys too long for that are stored
/// in `h-<sha256(key)>.json`, with the document wrapped as
/// `{"key": ..., "value": ...}` so the key can be listed again.
///
/// Documents are written to a temporary file in the same directory and
/// renamed into place, so readers (including other processes) only ever see
/// a complete document.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    quota: Option<u64>,
    write_lock: Mutex<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    path: PathBuf,
    hashed: bool,
}

#[derive(Serialize)]
struct HashedDocumentRef<'a> {
    key: &'a str,
    value: &'a Value,
}

#[derive(Deserialize)]
struct HashedDocument {
    key: String,
    value: Value,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(path = %dir.display(), "Opened durable store");
        Ok(Self {
            dir,
            quota: None,
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn locate(&self, key: &str) -> Location {
        let encoded = hex::encode(key);
        if encoded.len() <= MAX_PLAIN_HEX {
            Location {
                path: self
                    .dir
                    .join(format!("{PLAIN_PREFIX}{encoded}.{DOCUMENT_EXTENSION}")),
                hashed: false,
            }
        } else {
            let digest = hex::encode(Sha256::digest(key.as_bytes()));
            Location {
                path: self
                    .dir
                    .join(format!("{HASHED_PREFIX}{digest}.{DOCUMENT_EXTENSION}")),
                hashed: true,
            }
        }
    }

    /// Every stored document as `(key, size on disk)`.
    fn documents(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            let Some(key) = stored_key(&path) else {
                tracing::debug!(path = %path.display(), "Ignoring foreign file in store directory");
                continue;
            };
            // The document may have been deleted by another process since read_dir.
            match entry.metadata() {
                Ok(metadata) => documents.push((key, metadata.len())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(documents)
    }
}

/// Recover the key a document file was written under.
fn stored_key(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if let Some(encoded) = stem.strip_prefix(PLAIN_PREFIX) {
        return String::from_utf8(hex::decode(encoded).ok()?).ok();
    }
    if stem.starts_with(HASHED_PREFIX) {
        let bytes = fs::read(path).ok()?;
        let document: HashedDocument = serde_json::from_slice(&bytes).ok()?;
        return Some(document.key);
    }
    None
}

impl DurableStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let location = self.locate(key);
        let bytes = match fs::read(&location.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !location.hashed {
            return serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::serialization(key, e));
        }
        let document: HashedDocument =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::serialization(key, e))?;
        if document.key == key {
            Ok(Some(document.value))
        } else {
            tracing::warn!(path = %location.path.display(), "Hashed document belongs to another key");
            Ok(None)
        }
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let location = self.locate(key);
        let encoded = if location.hashed {
            serde_json::to_vec(&HashedDocumentRef { key, value })
        } else {
            serde_json::to_vec(value)
        }
        .map_err(|e| StoreError::serialization(key, e))?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.quota.is_some() {
            let used: u64 = self
                .documents()?
                .iter()
                .filter(|(existing, _)| existing != key)
                .map(|(existing, len)| entry_size(existing, *len as usize))
                .sum();
            check_quota(key, self.quota, used, entry_size(key, encoded.len()))?;
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&location.path).map_err(|e| e.error)?;

        tracing::trace!(key, bytes = encoded.len(), hashed = location.hashed, "Wrote document");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(self.locate(key).path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.documents()?.into_iter().map(|(key, _)| key).collect();
        keys.sort();
        Ok(keys)
    }

    fn used_bytes(&self) -> Result<u64, StoreError> {
        Ok(self
            .documents()?
            .iter()
            .map(|(key, len)| entry_size(key, *len as usize))
            .sum())
    }
}
