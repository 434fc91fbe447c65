//! Storage abstraction traits
//!
//! These traits let the engine run against the JSON archive, the in-memory
//! store, or any future database backend without changing sync code.
//! Both are synchronous: the engine issues writes sequentially.

use crate::error::Result;
use chrono::{DateTime, Utc};
use faunasync_client::{GroupId, Record};

/// Idempotent record storage keyed by record id.
pub trait Storage {
    /// Upsert a batch of records for a group.
    ///
    /// Delivering the same record twice must leave exactly one logical copy.
    /// `chunk` identifies the originating page or batch, for observability.
    ///
    /// Returns the number of records written.
    fn store(&self, group: &GroupId, chunk: &str, items: &[Record]) -> Result<usize>;

    /// Delete records by id.
    ///
    /// Deleting an id that was never stored is a no-op, not an error.
    fn delete(&self, ids: &[String]) -> Result<()>;
}

/// Per-group timestamp of the last successful sync.
///
/// Read before a differential run, overwritten (not versioned) after it.
pub trait CheckpointStore {
    fn get(&self, group: &GroupId) -> Result<Option<DateTime<Utc>>>;

    fn set(&self, group: &GroupId, at: DateTime<Utc>) -> Result<()>;
}
