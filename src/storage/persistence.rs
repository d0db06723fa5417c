//! DetectionStore trait: pluggable storage backend
//!
//! Abstracts detection persistence so backends can be swapped without
//! touching pipeline code:
//! - `SledDetectionStore`: embedded on-disk store (default)
//! - `InMemoryDetectionStore`: in-memory store for testing and throwaway deployments

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::types::{DetectionRecord, DocumentId};

/// Trait for pluggable persistence backends
///
/// Append-only: the pipeline only ever calls [`DetectionStore::save`].
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across request tasks. `save` may block and is called from a blocking worker.
pub trait DetectionStore: Send + Sync {
    /// Append one record and return its generated id
    fn save(&self, record: &DetectionRecord) -> Result<DocumentId, PersistenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sled::Error> for PersistenceError {
    fn from(err: sled::Error) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// In-memory persistence for testing and throwaway deployments
///
/// Thread-safe via `RwLock`. Not durable: data is lost on restart.
pub struct InMemoryDetectionStore {
    records: RwLock<Vec<(DocumentId, DetectionRecord)>>,
    next_id: AtomicU64,
}

impl InMemoryDetectionStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Look up a record by id
    pub fn get(&self, id: &DocumentId) -> Result<Option<DetectionRecord>, PersistenceError> {
        let store = self
            .records
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        Ok(store
            .iter()
            .find(|(stored_id, _)| stored_id == id)
            .map(|(_, record)| record.clone()))
    }

    /// All records, oldest first
    pub fn all(&self) -> Result<Vec<(DocumentId, DetectionRecord)>, PersistenceError> {
        let store = self
            .records
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        Ok(store.clone())
    }

    pub fn count(&self) -> usize {
        self.records.read().map_or(0, |store| store.len())
    }
}

impl Default for InMemoryDetectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionStore for InMemoryDetectionStore {
    fn save(&self, record: &DetectionRecord) -> Result<DocumentId, PersistenceError> {
        let id = DocumentId::new(format!(
            "{:016x}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));

        let mut store = self
            .records
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.push((id.clone(), record.clone()));

        Ok(id)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keypoint;

    fn make_record(path: &str) -> DetectionRecord {
        DetectionRecord::new(path.to_string(), vec![Keypoint::new("nose", 1.0, 2.0, 0.8)])
    }

    #[test]
    fn test_in_memory_save_and_get() {
        let store = InMemoryDetectionStore::new();
        let id = store.save(&make_record("a.png")).unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.image_path, "a.png");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_in_memory_ids_are_distinct() {
        let store = InMemoryDetectionStore::new();
        let first = store.save(&make_record("same.png")).unwrap();
        let second = store.save(&make_record("same.png")).unwrap();

        assert_ne!(first, second);
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn test_trait_object() {
        let store: Box<dyn DetectionStore> = Box::new(InMemoryDetectionStore::new());
        assert_eq!(store.backend_name(), "InMemory");
        assert!(store.save(&make_record("x")).is_ok());
    }
}
