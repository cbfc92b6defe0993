//! The `database` external collaborator (§6), consumed by [`crate::mtime::MtimeLayer`].

use std::collections::HashMap;
use std::sync::RwLock;

use crate::FsError;

/// Key/value store MtimeLayer persists virtual-mtime records through.
///
/// The core does not own an on-disk format (§6, "Persisted state") — a real
/// deployment plugs in whatever persistent store the surrounding
/// synchronisation engine already uses. [`MemoryDatabase`] is the crate's
/// only shipped implementation, sufficient for tests and in-memory-only
/// pipelines.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; MtimeLayer itself keeps no state
/// of its own and relies entirely on the database for concurrency control.
pub trait Database: Send + Sync {
    /// Fetch the raw bytes stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FsError>;

    /// Store `value` under `key`, overwriting any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), FsError>;

    /// Remove any value stored under `key`. Not an error if absent.
    fn delete(&self, key: &str) -> Result<(), FsError>;
}

/// An in-process, mutex-guarded reference [`Database`] implementation.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    map: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryDatabase {
    /// An empty database.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Database for MemoryDatabase {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FsError> {
        Ok(self.map.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), FsError> {
        self.map
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), FsError> {
        self.map.write().unwrap().remove(key);
        Ok(())
    }
}
