//! Snapshot differ.
//!
//! Reduces a baseline and a current snapshot to the minimal ordered set of
//! change entries needed to bring the downstream repository in sync.
//!
//! ## Entry point
//!
//! ```
//! use idsync_core::diff::compute_changes;
//! use idsync_core::model::{KeySpec, Record};
//!
//! let baseline = vec![Record::new().with("id", "u1")];
//! let current = vec![Record::new().with("id", "u1"), Record::new().with("id", "u2")];
//! let changes = compute_changes(baseline, current, &KeySpec::new(["id"])).unwrap();
//! assert_eq!(changes.entries.len(), 1);
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotence**: diffing a snapshot against itself yields no entries.
//! - **Completeness**: every key of either side appears in exactly one entry
//!   unless its payload is identical on both sides.
//! - **Determinism**: entries come out in natural-key order.
//! - **Unambiguity**: a natural key repeated within one snapshot aborts the diff.

pub mod engine;
pub mod model;
pub mod summary;

pub use engine::{compute_changes, compute_changes_with};
pub use model::{ChangeSet, DiffOptions, DiffStats};
pub use summary::render_summary;
