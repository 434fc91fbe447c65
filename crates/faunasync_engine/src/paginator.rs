//! Chunked pagination driver
//!
//! Runs one logical query to completion: fetch a page, hand it to the store
//! callback, and while the response carries a continuation token, merge the
//! token into the query and fetch again. Pages are never accumulated beyond
//! one at a time, so memory stays bounded regardless of result size.

use crate::error::{Result, SyncError};
use crate::tuning::Tuning;
use faunasync_client::{Page, Query, Transport};
use serde_json::Value;
use tracing::debug;

/// Query key the continuation token is merged under.
const PAGINATION_KEY: &str = "pagination_key";

/// Fetch every page for `query`, invoking `on_page` once per non-empty page
/// in fetch order. Returns the total item count across all pages.
///
/// A transfer failure aborts the loop and surfaces to the caller; pages
/// already handed to the callback stay applied (storage upserts are
/// idempotent, so a rerun is safe). A source that keeps producing
/// continuation tokens past `max_chunks` is a protocol violation.
pub fn fetch_all<T, F>(
    transport: &T,
    controler: &str,
    query: &Query,
    tuning: &Tuning,
    mut on_page: F,
) -> Result<u64>
where
    T: Transport + ?Sized,
    F: FnMut(&Page) -> Result<()>,
{
    let mut query = query.clone();
    let mut total: u64 = 0;
    let mut chunks: usize = 0;

    loop {
        let page = transport.fetch(controler, &query)?;
        chunks += 1;

        if !page.items.is_empty() {
            on_page(&page)?;
            total += page.items.len() as u64;
        }

        match page.continuation {
            Some(token) => {
                if chunks >= tuning.max_chunks {
                    return Err(SyncError::Protocol(format!(
                        "query against '{controler}' still paginating after {chunks} chunks"
                    )));
                }
                debug!(controler, chunk = chunks, total, "Following continuation token");
                query.insert(PAGINATION_KEY.to_string(), Value::String(token));
            }
            None => break,
        }
    }

    Ok(total)
}
