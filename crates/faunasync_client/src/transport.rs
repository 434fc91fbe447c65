//! Collaborator traits consumed by the sync engine
//!
//! Synchronous: the sync design is single-worker and sequential, so the
//! calling thread simply blocks for each request.

use crate::error::Result;
use crate::types::{DiffEntry, GroupId, LogicalGroup, Page, Query};
use chrono::{DateTime, Utc};

/// Fetches pages and diff feeds from the remote service.
pub trait Transport {
    /// Fetch one page for a controler path and query.
    ///
    /// `Page::continuation` is present iff more data is pending for the
    /// same query.
    fn fetch(&self, controler: &str, query: &Query) -> Result<Page>;

    /// Fetch the full change set for a group since a timestamp.
    ///
    /// Ordering of the returned entries is not significant.
    fn diff(&self, group: &GroupId, since: DateTime<Utc>) -> Result<Vec<DiffEntry>>;
}

/// Enumerates the logical groups known to the remote site.
pub trait Catalog {
    fn list_groups(&self) -> Result<Vec<LogicalGroup>>;
}
