//! File-based JSON archival backend
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   checkpoints.json          group id -> last sync timestamp
//!   <group id>/
//!     <record id>.json        one file per record, overwritten on upsert
//! ```
//!
//! One file per record makes the upsert and delete contracts literal
//! filesystem operations: rewriting a file is the upsert, removing a missing
//! file is the no-op delete.

use crate::error::{Result, StoreError};
use crate::traits::{CheckpointStore, Storage};
use chrono::{DateTime, Utc};
use faunasync_client::{GroupId, Record};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const CHECKPOINTS_FILE: &str = "checkpoints.json";

/// JSON file archive rooted at a directory.
pub struct JsonFileStore {
    root: PathBuf,
    // Serializes checkpoint read-modify-write cycles
    checkpoint_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (creating if needed) an archive at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            checkpoint_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, group: &GroupId, id: &str) -> PathBuf {
        self.root
            .join(safe_name(group.as_str()))
            .join(format!("{}.json", safe_name(id)))
    }

    fn checkpoints_path(&self) -> PathBuf {
        self.root.join(CHECKPOINTS_FILE)
    }

    fn read_checkpoints(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let path = self.checkpoints_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_checkpoints(&self, checkpoints: &HashMap<String, DateTime<Utc>>) -> Result<()> {
        let content = serde_json::to_string_pretty(checkpoints)?;
        fs::write(self.checkpoints_path(), content)?;
        Ok(())
    }

    /// Group directories currently present in the archive.
    fn group_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

/// Keep ids usable as file names. Remote ids are numeric in practice, but a
/// hostile id must not escape the archive directory.
fn safe_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl Storage for JsonFileStore {
    fn store(&self, group: &GroupId, chunk: &str, items: &[Record]) -> Result<usize> {
        let group_dir = self.root.join(safe_name(group.as_str()));
        fs::create_dir_all(&group_dir)?;

        for item in items {
            let content = serde_json::to_string_pretty(&item.payload)?;
            fs::write(self.record_path(group, &item.id), content)?;
        }
        debug!(group = %group, chunk, count = items.len(), "Archived records");
        Ok(items.len())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        let dirs = self.group_dirs()?;
        for id in ids {
            let file_name = format!("{}.json", safe_name(id));
            for dir in &dirs {
                let path = dir.join(&file_name);
                match fs::remove_file(&path) {
                    Ok(()) => break,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(StoreError::Io(e)),
                }
            }
        }
        Ok(())
    }
}

impl CheckpointStore for JsonFileStore {
    fn get(&self, group: &GroupId) -> Result<Option<DateTime<Utc>>> {
        let _guard = self
            .checkpoint_lock
            .lock()
            .map_err(|_| StoreError::Lock("checkpoint mutex poisoned".into()))?;
        Ok(self.read_checkpoints()?.get(group.as_str()).copied())
    }

    fn set(&self, group: &GroupId, at: DateTime<Utc>) -> Result<()> {
        let _guard = self
            .checkpoint_lock
            .lock()
            .map_err(|_| StoreError::Lock("checkpoint mutex poisoned".into()))?;
        let mut checkpoints = self.read_checkpoints()?;
        checkpoints.insert(group.as_str().to_string(), at);
        self.write_checkpoints(&checkpoints)
    }
}
