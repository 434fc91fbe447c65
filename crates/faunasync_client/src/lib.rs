//! Faunasync client - remote API transport layer
//!
//! Wraps the wildlife-observation HTTP API behind two narrow traits:
//!
//! - **Transport**: fetch one page of a filtered listing query, or the diff
//!   feed of changes since a timestamp
//! - **Catalog**: enumerate the taxonomic groups the account can access
//!
//! All requests are synchronous, blocking calls with bounded retry. The
//! chunked-transfer protocol (a continuation token linking successive pages
//! of one logical query) is surfaced as `Page::continuation`; driving the
//! token loop is the engine's job, not this crate's.

pub mod error;
pub mod http;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use error::{Result, TransferError};
pub use http::{HttpTransport, HttpTransportConfig};
pub use transport::{Catalog, Transport};
pub use types::{AccessMode, DiffEntry, GroupId, LogicalGroup, Page, Query, Record};

/// Controler path for the observation search endpoint.
pub const OBSERVATIONS_SEARCH: &str = "observations/search";
/// Controler path for listing observations by explicit id list.
pub const OBSERVATIONS_LIST: &str = "observations";
/// Controler path for the taxonomic group catalog.
pub const TAXO_GROUPS: &str = "taxo_groups";
/// Controler path for territorial units.
pub const TERRITORIAL_UNITS: &str = "territorial_units";
