//! Per-group orchestration
//!
//! Walks the group catalog and runs one sync operation per group,
//! sequentially. Each group's state is fully local to its run, so one
//! group's failure is logged and counted without blocking its siblings.
//!
//! Groups come in two kinds, a closed set: most are swept with the windowed
//! full scan, while reference tables (and the legacy list path for small
//! groups) are a plain list download per parameter set. The kind is a tagged
//! variant, dispatched in one place.

use crate::diff::DifferentialSync;
use crate::error::{Result, SyncError};
use crate::paginator::fetch_all;
use crate::scanner::{FullScanner, ScanBounds};
use crate::tuning::Tuning;
use chrono::{DateTime, Utc};
use faunasync_client::{GroupId, LogicalGroup, Query, Transport};
use faunasync_store::{CheckpointStore, Storage};
use tracing::{error, info, warn};

/// How a group's records are retrieved during a full refresh.
#[derive(Debug, Clone)]
pub enum SyncStrategy {
    /// Windowed backward sweep through the search endpoint, optionally
    /// narrowed per sub-filter (e.g. one pass per territorial unit).
    Search { sub_filters: Vec<Query> },
    /// One paginated list download per parameter set. Used for reference
    /// tables and groups small enough to fetch in one query.
    List {
        controler: String,
        param_sets: Vec<Query>,
    },
}

/// Tally of a multi-group run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Sequential multi-group driver.
pub struct Runner<'a, T: ?Sized, S: ?Sized, C: ?Sized> {
    transport: &'a T,
    storage: &'a S,
    checkpoints: &'a C,
    tuning: Tuning,
    /// Group names excluded from synchronization
    exclude: Vec<String>,
}

impl<'a, T, S, C> Runner<'a, T, S, C>
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
            exclude: Vec::new(),
        }
    }

    pub fn with_exclusions(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Groups that will actually be processed: accessible and not excluded.
    pub fn eligible<'g>(&self, groups: &'g [LogicalGroup]) -> Vec<&'g LogicalGroup> {
        groups
            .iter()
            .filter(|g| {
                if !g.is_accessible() {
                    info!(group = %g.id, name = %g.name, "Skipping group without access");
                    return false;
                }
                if self.exclude.iter().any(|name| name == &g.name) {
                    info!(group = %g.id, name = %g.name, "Skipping excluded group");
                    return false;
                }
                true
            })
            .collect()
    }

    /// Full refresh of every eligible group, one at a time.
    pub fn full_scan(
        &self,
        groups: &[LogicalGroup],
        strategy: &SyncStrategy,
        bounds: &ScanBounds,
    ) -> RunReport {
        let mut report = RunReport::default();
        for group in self.eligible(groups) {
            match self.refresh_group(&group.id, strategy, bounds) {
                Ok(records) => {
                    info!(group = %group.id, name = %group.name, records, "Full scan complete");
                    report.succeeded += 1;
                }
                Err(e) => {
                    error!(group = %group.id, name = %group.name, error = %e, "Full scan failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Differential sync of every eligible group since its checkpoint (or
    /// the explicit `since` date applied to all of them).
    pub fn update(
        &self,
        groups: &[LogicalGroup],
        since: Option<DateTime<Utc>>,
    ) -> RunReport {
        let sync =
            DifferentialSync::new(self.transport, self.storage, self.checkpoints, self.tuning.clone());
        let mut report = RunReport::default();
        for group in self.eligible(groups) {
            match sync.update(&group.id, since) {
                Ok(outcome) => {
                    info!(
                        group = %group.id,
                        name = %group.name,
                        updated = outcome.updated,
                        deleted = outcome.deleted,
                        "Differential sync complete"
                    );
                    report.succeeded += 1;
                }
                Err(SyncError::MissingCheckpoint(id)) => {
                    // No baseline: a full scan must run first for this group.
                    warn!(group = %id, name = %group.name, "No checkpoint, group skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(group = %group.id, name = %group.name, error = %e, "Differential sync failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn refresh_group(
        &self,
        group: &GroupId,
        strategy: &SyncStrategy,
        bounds: &ScanBounds,
    ) -> Result<u64> {
        match strategy {
            SyncStrategy::Search { sub_filters } => {
                let scanner = FullScanner::new(self.transport, self.storage, self.tuning.clone());
                let outcome = scanner.scan(group, sub_filters, bounds)?;
                Ok(outcome.records)
            }
            SyncStrategy::List {
                controler,
                param_sets,
            } => self.list_download(controler, group, param_sets),
        }
    }

    /// Plain list download: one paginated fetch per parameter set, stored as
    /// it streams in. Also serves reference tables, which have no time axis
    /// to window over.
    pub fn list_download(
        &self,
        controler: &str,
        group: &GroupId,
        param_sets: &[Query],
    ) -> Result<u64> {
        let unfiltered = [Query::new()];
        let passes: &[Query] = if param_sets.is_empty() {
            &unfiltered
        } else {
            param_sets
        };

        let mut total = 0u64;
        for (index, params) in passes.iter().enumerate() {
            let chunk = format!("{}_{}", group, index + 1);
            let mut query = params.clone();
            query.insert(
                "id_taxo_group".into(),
                serde_json::Value::String(group.0.clone()),
            );
            total += fetch_all(self.transport, controler, &query, &self.tuning, |page| {
                self.storage.store(group, &chunk, &page.items)?;
                Ok(())
            })?;
        }
        Ok(total)
    }
}
