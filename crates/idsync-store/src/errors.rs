//! Error handling for idsync-store
//!
//! Wraps idsync-core ExError with store-specific helpers

use std::path::Path;

use idsync_core::errors::{ExError, ExErrorKind, ReconError};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error
pub fn io_error(operation: &str, path: &Path, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_entity_id(path.display().to_string())
        .with_message(err.to_string())
}

/// Create a malformed-line error for a JSON Lines source
pub fn malformed_line(source_name: &str, line: u64, err: &serde_json::Error) -> ExError {
    ExError::from(ReconError::SourceRead {
        source_name: source_name.to_string(),
        line: Some(line),
        reason: err.to_string(),
    })
    .with_op("read_jsonl")
}

/// Create a serialization error
pub fn serialization_error(operation: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create an error sink write error
pub fn sink_write_error(path: &Path, err: std::io::Error) -> ExError {
    ExError::from(ReconError::SinkWrite {
        reason: format!("{}: {}", path.display(), err),
    })
    .with_op("error_sink_write")
}

/// Create a baseline commit error
pub fn commit_error(path: &Path, reason: impl std::fmt::Display) -> ExError {
    ExError::from(ReconError::Commit {
        reason: format!("{}: {}", path.display(), reason),
    })
    .with_op("baseline_commit")
}
