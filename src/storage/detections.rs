//! Detection record storage on Sled DB
//!
//! Records live in the named tree `pose_detections`. Keys are ids from
//! `Db::generate_id()` as big-endian u64 bytes, so iteration order is
//! insertion order and ids never repeat across restarts. Values are JSON.

use std::path::Path;
use std::sync::Arc;

use super::persistence::{DetectionStore, PersistenceError};
use crate::config::defaults::DETECTIONS_COLLECTION;
use crate::types::{DetectionRecord, DocumentId};

/// Sled-backed detection store
#[derive(Clone)]
pub struct SledDetectionStore {
    db: Arc<sled::Db>,
    tree: sled::Tree,
}

impl SledDetectionStore {
    /// Open or create the store at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let tree = db.open_tree(DETECTIONS_COLLECTION)?;

        tracing::info!(path = %path_ref.display(), records = tree.len(), "Detection store opened");

        Ok(Self {
            db: Arc::new(db),
            tree,
        })
    }

    /// Look up a record by id
    pub fn get(&self, id: &DocumentId) -> Result<Option<DetectionRecord>, PersistenceError> {
        let Some(key) = parse_id(id) else {
            return Ok(None);
        };
        match self.tree.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Get the most recent N records (newest first)
    pub fn recent(&self, limit: usize) -> Vec<(DocumentId, DetectionRecord)> {
        self.tree
            .iter()
            .rev()
            .filter_map(|item| {
                let (key, value) = item.ok()?;
                let key: [u8; 8] = key.as_ref().try_into().ok()?;
                let record = serde_json::from_slice(&value).ok()?;
                Some((format_id(u64::from_be_bytes(key)), record))
            })
            .take(limit)
            .collect()
    }

    /// Number of stored records
    pub fn count(&self) -> usize {
        self.tree.len()
    }
}

impl DetectionStore for SledDetectionStore {
    fn save(&self, record: &DetectionRecord) -> Result<DocumentId, PersistenceError> {
        let raw_id = self.db.generate_id()?;
        let value = serde_json::to_vec(record)?;

        self.tree.insert(raw_id.to_be_bytes(), value)?;
        self.tree.flush()?;

        let id = format_id(raw_id);
        tracing::debug!(id = %id, image_path = %record.image_path, "Stored detection record");
        Ok(id)
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}

fn format_id(raw: u64) -> DocumentId {
    DocumentId::new(format!("{raw:016x}"))
}

fn parse_id(id: &DocumentId) -> Option<[u8; 8]> {
    u64::from_str_radix(id.as_str(), 16)
        .ok()
        .map(u64::to_be_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keypoint;

    fn make_record(path: &str) -> DetectionRecord {
        DetectionRecord::new(
            path.to_string(),
            vec![
                Keypoint::new("nose", 10.0, 20.0, 0.9),
                Keypoint::new("left_eye", 11.0, 19.0, 0.8),
            ],
        )
    }

    #[test]
    fn test_store_open() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledDetectionStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_save_and_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledDetectionStore::open(temp_dir.path()).unwrap();

        let record = make_record("uploads/pose 1 (ü).png");
        let id = store.save(&record).unwrap();

        let fetched = store.get(&id).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(id.as_str().len(), 16);
    }

    #[test]
    fn test_unknown_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledDetectionStore::open(temp_dir.path()).unwrap();

        assert!(store.get(&DocumentId::new("00000000000000ff")).unwrap().is_none());
        assert!(store.get(&DocumentId::new("not-hex")).unwrap().is_none());
    }

    #[test]
    fn test_same_record_twice_gets_two_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledDetectionStore::open(temp_dir.path()).unwrap();

        let record = make_record("dup.png");
        let first = store.save(&record).unwrap();
        let second = store.save(&record).unwrap();

        assert_ne!(first, second);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledDetectionStore::open(temp_dir.path()).unwrap();

        store.save(&make_record("one")).unwrap();
        store.save(&make_record("two")).unwrap();
        let third = store.save(&make_record("three")).unwrap();

        let recent = store.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].0, third);
        assert_eq!(recent[0].1.image_path, "three");
        assert_eq!(recent[1].1.image_path, "two");
    }
}
