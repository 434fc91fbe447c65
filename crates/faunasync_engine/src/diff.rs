//! Differential reconciliation
//!
//! Routine incremental path: ask the remote for everything that changed
//! since the last checkpoint, classify each entry as update or delete,
//! re-fetch updated records in bounded batches, and apply deletes in one
//! pass. The checkpoint is advanced only after the whole run succeeds, so a
//! crash mid-run reprocesses from the old checkpoint instead of skipping a
//! gap; idempotent upserts make the reprocessing harmless.

use crate::error::{Result, SyncError};
use crate::paginator::fetch_all;
use crate::tuning::Tuning;
use chrono::{DateTime, Utc};
use faunasync_client::{GroupId, Query, Transport, OBSERVATIONS_LIST};
use faunasync_store::{CheckpointStore, Storage};
use serde_json::Value;
use tracing::info;

/// Wire values of the diff feed's modification kind.
const KIND_UPDATED: &str = "updated";
const KIND_DELETED: &str = "deleted";

/// What a completed differential run applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOutcome {
    pub updated: usize,
    pub deleted: usize,
}

/// Differential sync for one logical group at a time.
pub struct DifferentialSync<'a, T: ?Sized, S: ?Sized, C: ?Sized> {
    transport: &'a T,
    storage: &'a S,
    checkpoints: &'a C,
    tuning: Tuning,
}

impl<'a, T, S, C> DifferentialSync<'a, T, S, C>
where
    T: Transport + ?Sized,
    S: Storage + ?Sized,
    C: CheckpointStore + ?Sized,
{
    pub fn new(transport: &'a T, storage: &'a S, checkpoints: &'a C, tuning: Tuning) -> Self {
        Self {
            transport,
            storage,
            checkpoints,
            tuning,
        }
    }

    /// Apply every change since `since` (explicit, else the group's
    /// checkpoint). Without either there is no baseline to diff against and
    /// the group must be skipped.
    ///
    /// A transfer failure while fetching an update batch aborts the
    /// remaining batches without rolling back the applied ones; the
    /// checkpoint is left untouched, so the next run re-covers the window.
    pub fn update(&self, group: &GroupId, since: Option<DateTime<Utc>>) -> Result<DiffOutcome> {
        let since = match since {
            Some(at) => at,
            None => self
                .checkpoints
                .get(group)?
                .ok_or_else(|| SyncError::MissingCheckpoint(group.clone()))?,
        };

        // Captured before fetching: everything the feed reports from here on
        // belongs to the next run.
        let run_started = Utc::now();

        let entries = self.transport.diff(group, since)?;

        let mut updated: Vec<String> = Vec::new();
        let mut deleted: Vec<String> = Vec::new();
        for entry in entries {
            match entry.modification.as_str() {
                KIND_UPDATED => updated.push(entry.id),
                KIND_DELETED => deleted.push(entry.id),
                other => {
                    return Err(SyncError::Protocol(format!(
                        "record {} has unknown modification kind '{other}'",
                        entry.id
                    )))
                }
            }
        }

        info!(
            group = %group,
            since = %since,
            updated = updated.len(),
            deleted = deleted.len(),
            "Diff feed classified"
        );

        let batch_size = self.tuning.max_list_length.max(1);
        for (index, batch) in updated.chunks(batch_size).enumerate() {
            let chunk = format!("{}_upd_{}", group, index + 1);
            let mut query = Query::new();
            query.insert("id_taxo_group".into(), Value::String(group.0.clone()));
            query.insert(
                "id_sightings_list".into(),
                Value::String(batch.join(",")),
            );
            fetch_all(
                self.transport,
                OBSERVATIONS_LIST,
                &query,
                &self.tuning,
                |page| {
                    self.storage.store(group, &chunk, &page.items)?;
                    Ok(())
                },
            )?;
        }

        if !deleted.is_empty() {
            self.storage.delete(&deleted)?;
        }

        // Full success: only now does the checkpoint advance.
        self.checkpoints.set(group, run_started)?;

        Ok(DiffOutcome {
            updated: updated.len(),
            deleted: deleted.len(),
        })
    }
}
