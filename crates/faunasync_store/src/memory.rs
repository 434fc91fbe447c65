//! In-memory store for tests and dry runs

use crate::error::{Result, StoreError};
use crate::traits::{CheckpointStore, Storage};
use chrono::{DateTime, Utc};
use faunasync_client::{GroupId, Record};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory backend: records keyed by id, checkpoints keyed by group.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, (GroupId, Record)>>,
    checkpoints: Mutex<HashMap<GroupId, DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logical records currently stored.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up one record by id.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(id).map(|(_, rec)| rec.clone()))
    }

    /// All stored ids, sorted. Test helper.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Lock(format!("{what} mutex poisoned"))
}

impl Storage for MemoryStore {
    fn store(&self, group: &GroupId, _chunk: &str, items: &[Record]) -> Result<usize> {
        let mut records = self.records.lock().map_err(|_| poisoned("records"))?;
        for item in items {
            records.insert(item.id.clone(), (group.clone(), item.clone()));
        }
        Ok(items.len())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| poisoned("records"))?;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }
}

impl CheckpointStore for MemoryStore {
    fn get(&self, group: &GroupId) -> Result<Option<DateTime<Utc>>> {
        let checkpoints = self.checkpoints.lock().map_err(|_| poisoned("checkpoints"))?;
        Ok(checkpoints.get(group).copied())
    }

    fn set(&self, group: &GroupId, at: DateTime<Utc>) -> Result<()> {
        let mut checkpoints = self.checkpoints.lock().map_err(|_| poisoned("checkpoints"))?;
        checkpoints.insert(group.clone(), at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            payload: json!({"id": id}),
        }
    }

    #[test]
    fn test_store_is_idempotent() {
        let store = MemoryStore::new();
        let group = GroupId::from("1");

        store.store(&group, "1_1", &[record("a"), record("b")]).unwrap();
        store.store(&group, "1_2", &[record("a")]).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_delete_missing_id_is_noop() {
        let store = MemoryStore::new();
        let group = GroupId::from("1");
        store.store(&group, "1_1", &[record("a")]).unwrap();

        store.delete(&["a".to_string(), "never-stored".to_string()]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_checkpoint_roundtrip_and_overwrite() {
        let store = MemoryStore::new();
        let group = GroupId::from("1");
        assert!(CheckpointStore::get(&store, &group).unwrap().is_none());

        let first = Utc::now();
        store.set(&group, first).unwrap();
        assert_eq!(CheckpointStore::get(&store, &group).unwrap(), Some(first));

        let later = first + chrono::Duration::hours(1);
        store.set(&group, later).unwrap();
        assert_eq!(CheckpointStore::get(&store, &group).unwrap(), Some(later));
    }
}
