//! Detection Record Storage
//!
//! Append-only persistence for successful detections. The pipeline talks to
//! the [`DetectionStore`] trait; the backend is chosen from config at startup.

mod detections;
pub mod persistence;

pub use detections::SledDetectionStore;
pub use persistence::{DetectionStore, InMemoryDetectionStore, PersistenceError};

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};

/// Open the configured backend.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn DetectionStore>, PersistenceError> {
    match config.backend {
        StorageBackend::Sled => {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PersistenceError::Storage(format!(
                        "failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            Ok(Arc::new(SledDetectionStore::open(&config.path)?))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory detection store, records are lost on restart");
            Ok(Arc::new(InMemoryDetectionStore::new()))
        }
    }
}
