//! Error sink and baseline commit interfaces, with in-memory implementations.

use chrono::{DateTime, Utc};
use idsync_core_types::RunId;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::errors::{ExError, ExErrorKind};
use crate::model::{ChangeEntry, Record};
use crate::resolver::DependencyEdge;

/// One item of actionable residue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum SinkItem {
    /// A record of an aborted run's original input
    Record { record: Record },
    /// A change entry that could not be applied
    Change { entry: ChangeEntry },
    /// A deferred record whose owner never materialized
    Unresolved { edge: DependencyEdge },
}

/// Destination for aborted-run originals and final unresolved residue
pub trait ErrorSink {
    /// # Errors
    ///
    /// Returns `SinkWrite` or `Io` when the items could not be stored.
    fn write(&mut self, items: &[SinkItem]) -> Result<(), ExError>;
}

/// Baseline-for-next-run record written when a run completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineMarker {
    pub run_id: RunId,
    pub committed_at: DateTime<Utc>,
    /// sha256 of the reconciled snapshot, absent in full-replace mode
    pub snapshot_digest: Option<String>,
    pub record_count: usize,
}

impl BaselineMarker {
    pub fn new(run_id: RunId, snapshot_digest: Option<String>, record_count: usize) -> Self {
        Self {
            run_id,
            committed_at: Utc::now(),
            snapshot_digest,
            record_count,
        }
    }
}

/// Commits the baseline marker, once, at the end of a non-aborted run
pub trait BaselineCommit {
    /// # Errors
    ///
    /// Returns `Commit` or `Io` when the marker could not be persisted.
    fn commit(&mut self, marker: &BaselineMarker) -> Result<(), ExError>;
}

/// Digest of a snapshot independent of record order.
///
/// Records are serialized canonically (fields in name order), sorted, and
/// hashed line by line.
///
/// # Errors
///
/// - `Serialization`: a record could not be encoded as JSON
pub fn snapshot_digest(records: &[Record]) -> Result<String, ExError> {
    let mut lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<String>, _>>()
        .map_err(|e| {
            ExError::new(ExErrorKind::Serialization)
                .with_op("snapshot_digest")
                .with_message(e.to_string())
        })?;
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Error sink keeping residue in memory
#[derive(Debug, Default)]
pub struct MemoryErrorSink {
    items: Vec<SinkItem>,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[SinkItem] {
        &self.items
    }

    /// Natural keys of the unresolved residue, in write order
    pub fn unresolved_keys(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| match item {
                SinkItem::Unresolved { edge } => Some(edge.dependent_key.to_string()),
                _ => None,
            })
            .collect()
    }
}

impl ErrorSink for MemoryErrorSink {
    fn write(&mut self, items: &[SinkItem]) -> Result<(), ExError> {
        self.items.extend_from_slice(items);
        Ok(())
    }
}

/// Baseline commit remembering every marker it was given
#[derive(Debug, Default)]
pub struct MemoryBaseline {
    commits: Vec<BaselineMarker>,
}

impl MemoryBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> &[BaselineMarker] {
        &self.commits
    }

    pub fn last(&self) -> Option<&BaselineMarker> {
        self.commits.last()
    }
}

impl BaselineCommit for MemoryBaseline {
    fn commit(&mut self, marker: &BaselineMarker) -> Result<(), ExError> {
        self.commits.push(marker.clone());
        Ok(())
    }
}
