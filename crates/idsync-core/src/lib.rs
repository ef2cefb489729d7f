//! idsync core - incremental identity reconciliation engine
//!
//! This crate holds the engine proper:
//! - natural-key records and change entries ([`model`])
//! - the snapshot differ ([`diff`])
//! - windowed reading of change sequences ([`window`])
//! - forward-reference dependency resolution ([`resolver`])
//! - the run controller and its collaborator seams ([`controller`],
//!   [`handler`], [`sink`])
//!
//! File-backed collaborators live in `idsync-store`.

pub mod config;
pub mod controller;
pub mod diff;
pub mod errors;
pub mod handler;
pub mod logging_facility;
pub mod model;
pub mod resolver;
pub mod sink;
pub mod window;

// Re-export commonly used types
pub use config::{RunConfig, RunMode};
pub use controller::{Reconciler, RunInput, RunSummary, StopSignal};
pub use diff::{compute_changes, compute_changes_with, ChangeSet, DiffOptions, DiffStats};
pub use errors::{ExError, ExErrorKind, ReconError, Result};
pub use handler::{HandleOutcome, RecordHandler};
pub use model::{ChangeEntry, ChangeKind, FieldValue, KeyOf, KeySpec, NaturalKey, Record};
pub use resolver::{DependencyEdge, DependencyResolver};
pub use sink::{BaselineCommit, BaselineMarker, ErrorSink, MemoryBaseline, MemoryErrorSink, SinkItem};
pub use window::{ChangeSource, VecSource, WindowedReader};
