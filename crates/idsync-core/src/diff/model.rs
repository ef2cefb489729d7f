//! Snapshot diff output types.

use serde::{Deserialize, Serialize};

use crate::model::ChangeEntry;

/// Tuning for the payload comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Fields compared for UPDATE detection; empty compares every field
    #[serde(default)]
    pub compare_fields: Vec<String>,
}

/// Counters describing a computed change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Keys only in the current snapshot
    pub created: usize,
    /// Keys in both snapshots with a differing payload
    pub updated: usize,
    /// Keys only in the baseline snapshot
    pub deleted: usize,
    /// Keys in both snapshots with an identical payload
    pub unchanged: usize,
}

impl DiffStats {
    /// Total number of emitted change entries
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Result of diffing two snapshots: entries in natural-key order plus counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub entries: Vec<ChangeEntry>,
    pub stats: DiffStats,
}

impl ChangeSet {
    /// True when the two snapshots carried the same records
    pub fn is_identical(&self) -> bool {
        self.entries.is_empty()
    }
}
