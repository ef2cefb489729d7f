//! Correlation types for run tracking
//!
//! Every reconciliation run carries a `RunId` so that its log events, run
//! summary and committed baseline marker can be tied back together.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Generate a new RunId using UUIDv7 (time ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context carried through a run for correlation
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    /// Name of the scheduled task that owns the run, if any
    pub task: Option<String>,
}

impl RunContext {
    /// Create a new context with a fresh RunId
    pub fn new() -> Self {
        Self {
            run_id: RunId::new(),
            task: None,
        }
    }

    /// Create a context with an existing RunId
    pub fn with_run_id(run_id: RunId) -> Self {
        Self { run_id, task: None }
    }

    /// Attach the owning task name
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_generation() {
        let id1 = RunId::new();
        let id2 = RunId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_run_id_display() {
        let id = RunId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_run_context_with_task() {
        let ctx = RunContext::new().with_task("users-trusted");
        assert_eq!(ctx.task.as_deref(), Some("users-trusted"));
        assert!(!ctx.run_id.as_str().is_empty());
    }

    #[test]
    fn test_serialization() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
