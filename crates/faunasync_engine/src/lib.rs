//! Faunasync engine - adaptive windowed synchronization
//!
//! Incrementally mirrors a remote, paginated, rate-sensitive dataset of
//! timestamped wildlife observations into a local store. The remote source
//! has no bulk export, truncates oversized queries, and mutates continuously,
//! so two sync paths exist:
//!
//! ```text
//! ┌────────────────┐    window    ┌──────────────────┐   pages   ┌─────────┐
//! │  FullScanner   │─────────────▶│ ChunkedPaginator │──────────▶│ Storage │
//! │ (backward      │◀─────────────│  (continuation   │           │ (upsert)│
//! │  time sweep)   │  count → Pid │   token loop)    │           └─────────┘
//! └────────────────┘              └──────────────────┘
//!
//! ┌──────────────────┐  diff feed  ┌───────────────┐  batches   ┌─────────┐
//! │ DifferentialSync │────────────▶│ classify      │───────────▶│ Storage │
//! │ (since last      │             │ update/delete │  deletes   │         │
//! │  checkpoint)     │             └───────────────┘            └─────────┘
//! └──────────────────┘
//! ```
//!
//! The full scan partitions an unbounded time range into variable-width
//! windows; a discrete PID controller resizes each window so per-request
//! result volume stays near a target. The differential path applies only
//! what changed since the last checkpoint.
//!
//! Single-worker and sequential: one group at a time, one window or batch at
//! a time, all fetches blocking.

pub mod diff;
pub mod error;
pub mod paginator;
pub mod regulator;
pub mod runner;
pub mod scanner;
pub mod tuning;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use diff::{DiffOutcome, DifferentialSync};
pub use error::{Result, SyncError};
pub use paginator::fetch_all;
pub use regulator::Pid;
pub use runner::{RunReport, Runner, SyncStrategy};
pub use scanner::{FullScanner, ScanBounds, ScanOutcome};
pub use tuning::Tuning;
