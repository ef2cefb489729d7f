//! Reconciliation controller.
//!
//! One [`Reconciler`] drives one run through
//! `INIT → DIFFING → PROCESSING(pass) → FINALIZING → DONE`, with `ABORT`
//! reachable on any fatal error:
//!
//! - `INIT` validates the configuration. Snapshot input goes to `DIFFING`,
//!   a change source (full-replace mode) straight to `PROCESSING(1)`.
//! - `PROCESSING(pass)` reads the change sequence window by window and hands
//!   every entry to the [`RecordHandler`]. Entries reported as
//!   `MissingOwner` are deferred in the [`DependencyResolver`]; a successful
//!   entry promotes its key. At the end of a pass the resolver ages what is
//!   still pending and, while passes remain, resolved and pending entries
//!   become the sequence of the next pass.
//! - `FINALIZING` flushes unresolved edges and rejected entries to the
//!   [`ErrorSink`] and commits the baseline.
//! - `ABORT` routes the original current snapshot to the error sink, skips
//!   the baseline commit, and returns the fatal error.
//!
//! A [`StopSignal`] is polled before every window and every record. A stop
//! finishes the record in progress and goes straight to `FINALIZING`.

mod state;
mod stop;

pub use state::{RunPhase, RunState, RunSummary};
pub use stop::StopSignal;

use std::time::Instant;

use idsync_core_types::RunContext;

use crate::config::RunConfig;
use crate::diff::compute_changes_with;
use crate::errors::{ExError, ReconError};
use crate::handler::{HandleOutcome, RecordHandler};
use crate::model::{ChangeEntry, Record};
use crate::resolver::DependencyResolver;
use crate::sink::{snapshot_digest, BaselineCommit, BaselineMarker, ErrorSink, SinkItem};
use crate::window::{ChangeSource, VecSource, WindowedReader};
use crate::{log_op_end, log_op_error, log_op_start};

/// Input of a run
pub enum RunInput<'s> {
    /// Baseline and current snapshots, diffed before processing
    Snapshots {
        baseline: Vec<Record>,
        current: Vec<Record>,
    },
    /// A ready change sequence, processed as is
    Changes(Box<dyn ChangeSource + 's>),
}

impl<'s> RunInput<'s> {
    pub fn snapshots(baseline: Vec<Record>, current: Vec<Record>) -> Self {
        RunInput::Snapshots { baseline, current }
    }

    pub fn changes(source: impl ChangeSource + 's) -> Self {
        RunInput::Changes(Box::new(source))
    }
}

/// Facts about the reconciled snapshot recorded in the baseline marker
struct SnapshotFacts {
    digest: String,
    record_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassFlow {
    Completed,
    Empty,
    Stopped,
}

/// Drives a single reconciliation run
pub struct Reconciler<'a> {
    config: RunConfig,
    context: RunContext,
    handler: &'a mut dyn RecordHandler,
    sink: &'a mut dyn ErrorSink,
    baseline: &'a mut dyn BaselineCommit,
    stop: StopSignal,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: RunConfig,
        handler: &'a mut dyn RecordHandler,
        sink: &'a mut dyn ErrorSink,
        baseline: &'a mut dyn BaselineCommit,
    ) -> Self {
        Self {
            config,
            context: RunContext::new(),
            handler,
            sink,
            baseline,
            stop: StopSignal::new(),
        }
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle for requesting a stop from elsewhere
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig`: the configuration failed validation; nothing ran
    /// - `AmbiguousKey`: a snapshot repeats a natural key (run aborted)
    /// - `SourceRead` / `Io`: the change source failed (run aborted)
    /// - `SinkWrite` / `Commit`: finalization could not persist its output
    pub fn run(mut self, input: RunInput<'_>) -> Result<RunSummary, ExError> {
        let started = Instant::now();
        let run_id = self.context.run_id.clone();
        let task = self.context.task.clone().unwrap_or_default();
        log_op_start!(
            "reconcile",
            run_id = %run_id,
            task = %task,
            mode = ?self.config.mode,
            bulk_size = self.config.bulk_size,
            max_passes = self.config.max_passes()
        );

        if let Err(err) = self.config.validate() {
            let err = err.with_run_id(run_id.clone());
            log_op_error!(
                "reconcile",
                err.clone(),
                duration_ms = started.elapsed().as_millis() as u64,
                run_id = %run_id
            );
            return Err(err);
        }

        let mut state = RunState::new(run_id.clone(), self.config.max_passes());
        match self.execute(&mut state, input) {
            Ok(()) => {
                let summary = state.summary();
                log_op_end!(
                    "reconcile",
                    duration_ms = started.elapsed().as_millis() as u64,
                    run_id = %run_id,
                    passes = summary.passes,
                    success_count = summary.success_count,
                    failure_count = summary.failure_count,
                    ignored_count = summary.ignored_count,
                    deferred_count = state.deferred_count,
                    applied_keys = state.processed_keys.len(),
                    unresolved_count = summary.unresolved_count,
                    stopped = summary.stopped
                );
                Ok(summary)
            }
            Err(err) => {
                state.transition(RunPhase::Aborted).ok();
                let err = err.with_run_id(run_id.clone());
                log_op_error!(
                    "reconcile",
                    err.clone(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    run_id = %run_id,
                    pass = state.pass
                );
                Err(err)
            }
        }
    }

    fn execute(&mut self, state: &mut RunState, input: RunInput<'_>) -> Result<(), ExError> {
        let (source, facts) = self.prepare(state, input)?;
        let mut resolver = DependencyResolver::new();
        self.process(state, &mut resolver, source)?;
        self.finalize(state, &mut resolver, facts)
    }

    /// INIT and DIFFING: turn the input into the first pass's sequence.
    fn prepare<'s>(
        &mut self,
        state: &mut RunState,
        input: RunInput<'s>,
    ) -> Result<(Box<dyn ChangeSource + 's>, Option<SnapshotFacts>), ExError> {
        match input {
            RunInput::Changes(source) => {
                state.transition(RunPhase::Processing { pass: 1 })?;
                Ok((source, None))
            }
            RunInput::Snapshots { baseline, current } => {
                state.transition(RunPhase::Diffing)?;
                // Full replace: every current record is re-applied.
                let baseline = if self.config.incremental {
                    baseline
                } else {
                    Vec::new()
                };

                let changes = match compute_changes_with(
                    baseline,
                    current.iter().cloned(),
                    &self.config.key,
                    &self.config.diff_options(),
                ) {
                    Ok(changes) => changes,
                    Err(err) => {
                        if err.is_fatal() {
                            self.route_original(state, &current);
                        }
                        return Err(err);
                    }
                };

                let facts = SnapshotFacts {
                    digest: snapshot_digest(&current)?,
                    record_count: current.len(),
                };
                state.transition(RunPhase::Processing { pass: 1 })?;
                let source: Box<dyn ChangeSource + 's> =
                    Box::new(VecSource::new(changes.entries).with_label("snapshot diff"));
                Ok((source, Some(facts)))
            }
        }
    }

    /// PROCESSING: passes until the resolver has nothing left to retry or
    /// the pass budget is spent.
    fn process<'s>(
        &mut self,
        state: &mut RunState,
        resolver: &mut DependencyResolver,
        first: Box<dyn ChangeSource + 's>,
    ) -> Result<(), ExError> {
        let mut source = first;
        loop {
            let pass = state.pass;
            match self.run_pass(state, resolver, source)? {
                PassFlow::Stopped => {
                    state.stopped = true;
                    tracing::info!(run_id = %state.run_id, pass = pass, "stop requested, finalizing");
                    return Ok(());
                }
                PassFlow::Empty if pass == 1 => {
                    tracing::info!(run_id = %state.run_id, "nothing to do this run");
                    return Ok(());
                }
                PassFlow::Empty | PassFlow::Completed => {}
            }

            let report = resolver.age_and_demote(self.config.max_attempts);
            tracing::debug!(
                run_id = %state.run_id,
                pass = pass,
                aged = report.aged,
                demoted = report.demoted,
                "pass aged"
            );

            let retry = resolver.has_resolved() || resolver.has_pending();
            if !retry || pass >= state.max_passes {
                return Ok(());
            }

            let mut next = resolver.drain_resolved();
            next.extend(resolver.drain_pending());
            state.transition(RunPhase::Processing { pass: pass + 1 })?;
            let retry_source: Box<dyn ChangeSource + 's> =
                Box::new(VecSource::new(next).with_label(format!("retry pass {}", pass + 1)));
            source = retry_source;
        }
    }

    fn run_pass<'s>(
        &mut self,
        state: &mut RunState,
        resolver: &mut DependencyResolver,
        source: Box<dyn ChangeSource + 's>,
    ) -> Result<PassFlow, ExError> {
        let started = Instant::now();
        let pass = state.pass;
        let mut reader = WindowedReader::new(source);
        log_op_start!(
            "pass",
            run_id = %state.run_id,
            pass = pass,
            source = %reader.describe()
        );

        let mut flow = PassFlow::Completed;
        'windows: loop {
            if self.stop.is_requested() {
                flow = PassFlow::Stopped;
                break;
            }

            let window = match reader.next_window(self.config.bulk_size) {
                Ok(window) => window,
                Err(err) => {
                    log_op_error!(
                        "pass",
                        err.clone(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        run_id = %state.run_id,
                        pass = pass
                    );
                    return Err(err);
                }
            };
            if window.is_empty() {
                break;
            }
            tracing::debug!(run_id = %state.run_id, pass = pass, window_len = window.len(), "window");

            for entry in window {
                if self.stop.is_requested() {
                    flow = PassFlow::Stopped;
                    break 'windows;
                }
                self.apply(state, resolver, entry);
            }

            if reader.exhausted() {
                break;
            }
        }

        if flow == PassFlow::Completed && reader.was_empty() {
            flow = PassFlow::Empty;
        }
        log_op_end!(
            "pass",
            duration_ms = started.elapsed().as_millis() as u64,
            run_id = %state.run_id,
            pass = pass,
            windows = reader.windows_delivered(),
            change_count = reader.entries_delivered(),
            stopped = flow == PassFlow::Stopped
        );
        Ok(flow)
    }

    /// Hand one entry to the handler and act on its outcome.
    fn apply(&mut self, state: &mut RunState, resolver: &mut DependencyResolver, entry: ChangeEntry) {
        let key = entry.natural_key.clone();
        if !key.is_well_formed() {
            let err = ExError::from(ReconError::BlankKey {
                fields: self.config.key.fields.join(","),
            });
            tracing::warn!(
                run_id = %state.run_id,
                natural_key = ?key.as_str(),
                kind = %entry.kind,
                err_code = err.code(),
                err_message = err.message(),
                "change rejected"
            );
            state.reject(entry);
            return;
        }

        match self.handler.handle(&entry) {
            HandleOutcome::Success => {
                state.success_count += 1;
                let released = resolver.promote(&key);
                if released > 0 {
                    tracing::debug!(
                        run_id = %state.run_id,
                        owner_key = %key,
                        released = released,
                        "owner applied, dependents resolved"
                    );
                }
                state.processed_keys.insert(key);
            }
            HandleOutcome::Ignored => {
                state.ignored_count += 1;
            }
            HandleOutcome::MissingOwner(owner) if !owner.is_well_formed() => {
                tracing::warn!(
                    run_id = %state.run_id,
                    natural_key = %key,
                    "missing owner reported without an owner key"
                );
                state.reject(entry);
            }
            HandleOutcome::MissingOwner(owner) => {
                state.deferred_count += 1;
                tracing::debug!(
                    run_id = %state.run_id,
                    natural_key = %key,
                    owner_key = %owner,
                    pass = state.pass,
                    "deferred on missing owner"
                );
                resolver.defer(key, owner, entry);
            }
            HandleOutcome::HardFailure(reason) => {
                tracing::warn!(
                    run_id = %state.run_id,
                    natural_key = %key,
                    kind = %entry.kind,
                    reason = %reason,
                    "change rejected by handler"
                );
                state.reject(entry);
            }
        }
    }

    /// FINALIZING: residue to the error sink, then the baseline commit.
    fn finalize(
        &mut self,
        state: &mut RunState,
        resolver: &mut DependencyResolver,
        facts: Option<SnapshotFacts>,
    ) -> Result<(), ExError> {
        state.transition(RunPhase::Finalizing)?;

        let abandoned = resolver.abandon_remaining();
        let mut residue: Vec<SinkItem> = resolver
            .drain_unresolved()
            .into_iter()
            .map(|edge| SinkItem::Unresolved { edge })
            .collect();
        state.unresolved_count = residue.len() as u64;
        let rejected = state.rejected.len();
        residue.extend(
            state
                .rejected
                .drain(..)
                .map(|entry| SinkItem::Change { entry }),
        );
        if !residue.is_empty() {
            tracing::info!(
                run_id = %state.run_id,
                unresolved_count = state.unresolved_count,
                rejected = rejected,
                abandoned = abandoned,
                "flushing residue"
            );
            self.sink.write(&residue)?;
        }

        if state.stopped && !self.config.commit_when_stopped {
            tracing::info!(run_id = %state.run_id, "stopped run, baseline left as is");
        } else {
            let (digest, record_count) = match facts {
                Some(facts) => (Some(facts.digest), facts.record_count),
                None => (None, 0),
            };
            let marker = BaselineMarker::new(state.run_id.clone(), digest, record_count);
            self.baseline.commit(&marker)?;
        }

        state.transition(RunPhase::Done)
    }

    /// ABORT routing of the original current snapshot.
    fn route_original(&mut self, state: &RunState, current: &[Record]) {
        let items: Vec<SinkItem> = current
            .iter()
            .cloned()
            .map(|record| SinkItem::Record { record })
            .collect();
        if let Err(err) = self.sink.write(&items) {
            tracing::error!(
                run_id = %state.run_id,
                err_code = err.code(),
                err_message = err.message(),
                "original snapshot could not be routed to the error sink"
            );
        }
    }
}
