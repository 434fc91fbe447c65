//! Shared test doubles for the engine test modules

use chrono::{DateTime, Utc};
use faunasync_client::{
    DiffEntry, GroupId, LogicalGroup, Page, Query, Record, Result, Transport, TransferError,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted transport: pops one canned response per `fetch` call, in order,
/// and records every call for assertions. An exhausted script yields empty
/// final pages so over-fetching shows up as empty windows, not panics.
pub(crate) struct MockTransport {
    fetches: Mutex<VecDeque<ScriptedFetch>>,
    diffs: Mutex<VecDeque<Result<Vec<DiffEntry>>>>,
    log: Mutex<Vec<(String, Query)>>,
}

enum ScriptedFetch {
    Page(Page),
    Fail,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            fetches: Mutex::new(VecDeque::new()),
            diffs: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn push_page(&self, page: Page) {
        self.fetches.lock().unwrap().push_back(ScriptedFetch::Page(page));
    }

    pub fn push_failure(&self) {
        self.fetches.lock().unwrap().push_back(ScriptedFetch::Fail);
    }

    pub fn push_diff(&self, entries: Vec<DiffEntry>) {
        self.diffs.lock().unwrap().push_back(Ok(entries));
    }

    /// Every `fetch` call seen so far: (controler, query).
    pub fn fetch_log(&self) -> Vec<(String, Query)> {
        self.log.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn fetch(&self, controler: &str, query: &Query) -> Result<Page> {
        self.log
            .lock()
            .unwrap()
            .push((controler.to_string(), query.clone()));
        match self.fetches.lock().unwrap().pop_front() {
            Some(ScriptedFetch::Page(page)) => Ok(page),
            Some(ScriptedFetch::Fail) => Err(TransferError::RetriesExhausted {
                attempts: 1,
                last_error: "scripted failure".to_string(),
            }),
            None => Ok(Page::default()),
        }
    }

    fn diff(&self, _group: &GroupId, _since: DateTime<Utc>) -> Result<Vec<DiffEntry>> {
        match self.diffs.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }
}

pub(crate) fn record(id: &str) -> Record {
    Record {
        id: id.to_string(),
        payload: json!({"id": id}),
    }
}

pub(crate) fn page(ids: &[&str]) -> Page {
    Page {
        items: ids.iter().map(|id| record(id)).collect(),
        continuation: None,
    }
}

pub(crate) fn page_with_continuation(ids: &[&str], token: &str) -> Page {
    Page {
        items: ids.iter().map(|id| record(id)).collect(),
        continuation: Some(token.to_string()),
    }
}

pub(crate) fn diff_entry(id: &str, modification: &str) -> DiffEntry {
    DiffEntry {
        id: id.to_string(),
        modification: modification.to_string(),
    }
}

pub(crate) fn group(id: &str, name: &str) -> LogicalGroup {
    LogicalGroup {
        id: GroupId::from(id),
        name: name.to_string(),
        access: faunasync_client::AccessMode::Full,
    }
}
