use serde::{Deserialize, Serialize};

use crate::model::key::NaturalKey;
use crate::model::record::Record;

/// Operation a change entry asks the downstream repository to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Minimal diff unit between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub natural_key: NaturalKey,
    pub kind: ChangeKind,
    pub payload: Record,
}

impl ChangeEntry {
    pub fn new(natural_key: NaturalKey, kind: ChangeKind, payload: Record) -> Self {
        Self {
            natural_key,
            kind,
            payload,
        }
    }

    pub fn create(natural_key: impl Into<NaturalKey>, payload: Record) -> Self {
        Self::new(natural_key.into(), ChangeKind::Create, payload)
    }

    pub fn update(natural_key: impl Into<NaturalKey>, payload: Record) -> Self {
        Self::new(natural_key.into(), ChangeKind::Update, payload)
    }

    pub fn delete(natural_key: impl Into<NaturalKey>, payload: Record) -> Self {
        Self::new(natural_key.into(), ChangeKind::Delete, payload)
    }
}
