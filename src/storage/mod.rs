//! Flat-file persistence for crawl snapshots and checkpoints.
//!
//! ## Directory Structure
//!
//! ```text
//! github_data/
//! ├── repositories_20250101_120000.csv           # search results
//! ├── repositories_detailed_20250101_120000.csv  # detail + languages
//! └── contributors_20250101_120000.csv           # aggregated contributors
//! checkpoints/
//! └── crawler_checkpoint.json                    # resumable progress
//! ```
//!
//! The three CSV files sharing one timestamp form a snapshot. Readers always
//! pick the largest timestamp present.

pub mod checkpoint;
pub mod local;
pub mod snapshot;
pub mod table;

// Re-export for convenience
pub use checkpoint::CheckpointStore;
pub use local::LocalStorage;
pub use snapshot::{SnapshotFiles, TableKind, latest_timestamp, new_run_timestamp};
pub use table::{Row, Table, TableRecord};
