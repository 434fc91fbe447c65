//! Wire types shared by the transport and the sync engine
//!
//! Records are treated as opaque payloads: the only fields this system ever
//! interprets are the stable record id and, for diff entries, the
//! modification kind reported by the remote service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Request parameters for one logical query.
///
/// Ordered so that serialized queries (and log lines) are deterministic.
pub type Query = BTreeMap<String, serde_json::Value>;

/// Identifier of a logical group (one taxonomic group), synchronized
/// independently of its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Access level the remote site grants for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Full read access
    Full,
    /// Restricted subset visible
    Limited,
    /// No access; the group must be skipped
    None,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::Full => "full",
            AccessMode::Limited => "limited",
            AccessMode::None => "none",
        })
    }
}

/// One entry of the remote group catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(rename = "access_mode")]
    pub access: AccessMode,
}

impl LogicalGroup {
    /// Whether this group may be synchronized at all.
    pub fn is_accessible(&self) -> bool {
        self.access != AccessMode::None
    }
}

/// One remote record. The payload passes through to storage unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub payload: serde_json::Value,
}

/// One fetch response.
///
/// `continuation` present means more pages exist for the same logical query;
/// the engine merges the token back into the query and fetches again.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Record>,
    pub continuation: Option<String>,
}

/// One entry of the diff feed: a record that changed since a timestamp.
///
/// `modification` is kept as the raw wire string; classifying it into
/// update/delete (and rejecting anything else) is the engine's decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    #[serde(rename = "id_sighting")]
    pub id: String,
    #[serde(rename = "modification_type")]
    pub modification: String,
}
