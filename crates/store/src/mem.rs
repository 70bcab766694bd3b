use std::sync::Mutex;

use async_trait::async_trait;

use crate::entry::AuditEntry;
use crate::error::StoreError;
use crate::traits::AuditStore;

/// In-memory, append-only audit store.
///
/// The reference backend: a Mutex-guarded Vec in insertion order. Used by
/// the engine's own test suite and useful for embedders that want
/// run-once semantics without provisioning storage.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with pre-existing history, e.g. to simulate a
    /// previous interrupted run.
    pub fn with_entries(entries: Vec<AuditEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("audit store mutex poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<AuditEntry>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("audit store mutex poisoned".to_string()))?;
        Ok(entries.clone())
    }
}
