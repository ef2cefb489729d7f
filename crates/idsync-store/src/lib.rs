//! idsync store - file-backed collaborators of the reconciliation engine
//!
//! Provides:
//! - JSON Lines snapshot and change files
//! - An error file sink and the baseline/proceed-marker commit
//! - The per-task folder layout and quarantine of aborted input
//! - A journal handler and a runner wiring all of the above to a task

pub mod atomic;
pub mod baseline;
pub mod error_sink;
pub mod errors;
pub mod journal;
pub mod jsonl;
pub mod layout;
pub mod runner;

// Re-export key types
pub use baseline::{read_marker, FileBaseline};
pub use error_sink::JsonLinesErrorSink;
pub use errors::Result;
pub use journal::JournalHandler;
pub use jsonl::{read_snapshot, read_snapshot_or_empty, write_changes, write_snapshot, JsonLinesSource};
pub use layout::FileLayout;
pub use runner::TaskRun;
