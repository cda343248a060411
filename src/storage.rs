//! Durable client-side key-value storage for the session token.
//!
//! One string slot under a fixed key. The file-backed store keeps a small
//! JSON map on disk (browser local-storage semantics); the in-memory store
//! backs tests and hosts without a writable data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the on-disk key-value map.
const STORE_FILE: &str = "storage.json";

/// Errors from token storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Internal lock error")]
    LockPoisoned,
}

/// Durable slot for the backend session token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&self, token: &str) -> Result<(), StorageError>;
    /// Remove the token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StorageError>;
}

// ═══════════════════════════════════════════════════════════
// FileTokenStore
// ═══════════════════════════════════════════════════════════

/// Token store persisted as a JSON map in `<dir>/storage.json`.
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
    /// Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: &Path, key: &str) -> Self {
        Self {
            path: dir.join(STORE_FILE),
            key: key.to_string(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written map.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(self.read_map()?.remove(&self.key))
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut map = self.read_map()?;
        map.insert(self.key.clone(), token.to_string());
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut map = self.read_map()?;
        if map.remove(&self.key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// MemoryTokenStore
// ═══════════════════════════════════════════════════════════

/// In-memory token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .slot
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .clone())
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        *self.slot.lock().map_err(|_| StorageError::LockPoisoned)? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock().map_err(|_| StorageError::LockPoisoned)? = None;
        Ok(())
    }
}
