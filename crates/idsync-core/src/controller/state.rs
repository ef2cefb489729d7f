//! Run lifecycle state.

use std::collections::HashSet;
use std::fmt;

use idsync_core_types::RunId;
use serde::{Deserialize, Serialize};

use crate::errors::{ExError, ReconError};
use crate::model::{ChangeEntry, NaturalKey};

/// Phase of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Diffing,
    Processing { pass: u32 },
    Finalizing,
    Done,
    Aborted,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Aborted)
    }

    fn allows(&self, next: &RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (_, Aborted) => !self.is_terminal(),
            (Init, Diffing) => true,
            (Init, Processing { pass: 1 }) | (Diffing, Processing { pass: 1 }) => true,
            (Processing { pass }, Processing { pass: next }) => *next == pass + 1,
            (Processing { .. }, Finalizing) => true,
            (Finalizing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Init => write!(f, "INIT"),
            RunPhase::Diffing => write!(f, "DIFFING"),
            RunPhase::Processing { pass } => write!(f, "PROCESSING({})", pass),
            RunPhase::Finalizing => write!(f, "FINALIZING"),
            RunPhase::Done => write!(f, "DONE"),
            RunPhase::Aborted => write!(f, "ABORT"),
        }
    }
}

/// Outcome of a run, handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub passes: u32,
    pub success_count: u64,
    pub failure_count: u64,
    pub ignored_count: u64,
    pub unresolved_count: u64,
    pub stopped: bool,
}

/// Mutable bookkeeping of one run, discarded once summarized
#[derive(Debug)]
pub struct RunState {
    pub run_id: RunId,
    phase: RunPhase,
    pub pass: u32,
    pub max_passes: u32,
    /// Keys applied successfully during this run
    pub processed_keys: HashSet<NaturalKey>,
    /// Entries counted as failures, flushed to the error sink at the end
    pub rejected: Vec<ChangeEntry>,
    pub success_count: u64,
    pub failure_count: u64,
    pub ignored_count: u64,
    pub deferred_count: u64,
    pub unresolved_count: u64,
    pub stopped: bool,
}

impl RunState {
    pub fn new(run_id: RunId, max_passes: u32) -> Self {
        Self {
            run_id,
            phase: RunPhase::Init,
            pass: 0,
            max_passes,
            processed_keys: HashSet::new(),
            rejected: Vec::new(),
            success_count: 0,
            failure_count: 0,
            ignored_count: 0,
            deferred_count: 0,
            unresolved_count: 0,
            stopped: false,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// - `Internal`: the lifecycle does not allow this transition
    pub fn transition(&mut self, next: RunPhase) -> Result<(), ExError> {
        if !self.phase.allows(&next) {
            return Err(ExError::from(ReconError::Internal {
                message: format!("illegal run transition {} -> {}", self.phase, next),
            })
            .with_op("transition")
            .with_run_id(self.run_id.clone()));
        }
        tracing::debug!(
            run_id = %self.run_id,
            from = %self.phase,
            to = %next,
            "run phase"
        );
        if let RunPhase::Processing { pass } = next {
            self.pass = pass;
        }
        self.phase = next;
        Ok(())
    }

    /// Count `entry` as a failure and keep it for the error sink
    pub fn reject(&mut self, entry: ChangeEntry) {
        self.failure_count += 1;
        self.rejected.push(entry);
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            passes: self.pass,
            success_count: self.success_count,
            failure_count: self.failure_count,
            ignored_count: self.ignored_count,
            unresolved_count: self.unresolved_count,
            stopped: self.stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = RunState::new(RunId::new(), 3);
        state.transition(RunPhase::Diffing).unwrap();
        state.transition(RunPhase::Processing { pass: 1 }).unwrap();
        state.transition(RunPhase::Processing { pass: 2 }).unwrap();
        state.transition(RunPhase::Finalizing).unwrap();
        state.transition(RunPhase::Done).unwrap();
        assert_eq!(state.pass, 2);
        assert!(state.phase().is_terminal());
    }

    #[test]
    fn test_skipping_a_pass_is_rejected() {
        let mut state = RunState::new(RunId::new(), 3);
        state.transition(RunPhase::Processing { pass: 1 }).unwrap();
        let err = state
            .transition(RunPhase::Processing { pass: 3 })
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Internal);
    }

    #[test]
    fn test_no_transition_out_of_abort() {
        let mut state = RunState::new(RunId::new(), 1);
        state.transition(RunPhase::Aborted).unwrap();
        assert!(state.transition(RunPhase::Aborted).is_err());
        assert!(state.transition(RunPhase::Diffing).is_err());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Processing { pass: 2 }.to_string(), "PROCESSING(2)");
        assert_eq!(RunPhase::Aborted.to_string(), "ABORT");
    }

    #[test]
    fn test_summary_serializes_run_id() {
        let state = RunState::new(RunId::from_string("run-1".to_string()), 1);
        let json = serde_json::to_value(state.summary()).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["stopped"], false);
    }
}
