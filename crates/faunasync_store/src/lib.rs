//! Faunasync store - local persistence collaborators
//!
//! The engine never talks to a concrete store; it goes through two traits:
//!
//! - **Storage**: idempotent upsert of records keyed by id, delete by id
//! - **CheckpointStore**: the per-group timestamp of the last successful sync
//!
//! Two backends are provided. `MemoryStore` backs tests and dry runs.
//! `JsonFileStore` archives every record as one JSON file per id, which keeps
//! upsert idempotence trivial (rewriting a file is the upsert) and makes
//! deletes a plain file removal.

pub mod error;
pub mod jsonfile;
pub mod memory;
pub mod traits;

// Re-exports for convenience
pub use error::{Result, StoreError};
pub use jsonfile::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::{CheckpointStore, Storage};
