//! Runs one reconciliation task over its folder layout.

use std::path::{Path, PathBuf};
use std::time::Instant;

use idsync_core::controller::{Reconciler, RunInput, RunSummary, StopSignal};
use idsync_core::{log_op_error, ExError, ExErrorKind, RecordHandler, RunConfig};
use idsync_core_types::RunContext;

use crate::baseline::FileBaseline;
use crate::error_sink::JsonLinesErrorSink;
use crate::errors::Result;
use crate::jsonl::{read_snapshot, read_snapshot_or_empty, JsonLinesSource};
use crate::layout::FileLayout;

/// A run of one task with file-backed sink and baseline.
///
/// In incremental mode the current snapshot is diffed against the
/// baseline snapshot. Otherwise the task's change file is replayed when it
/// exists, and the current snapshot when it does not.
pub struct TaskRun<'l> {
    layout: &'l FileLayout,
    config: RunConfig,
    current: Option<PathBuf>,
    context: RunContext,
    stop: StopSignal,
}

impl<'l> TaskRun<'l> {
    pub fn new(layout: &'l FileLayout, config: RunConfig) -> Self {
        Self {
            layout,
            config,
            current: None,
            context: RunContext::new().with_task(layout.task()),
            stop: StopSignal::new(),
        }
    }

    /// Read the current snapshot from `path` instead of the data folder
    pub fn with_current(mut self, path: impl Into<PathBuf>) -> Self {
        self.current = Some(path.into());
        self
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run the task to completion with `handler`.
    ///
    /// # Errors
    ///
    /// Any fatal error of the run. An input file that failed to read, change
    /// file or snapshot, is moved to the error folder first.
    pub fn run(self, handler: &mut dyn RecordHandler) -> Result<RunSummary> {
        let TaskRun {
            layout,
            config,
            current,
            context,
            stop,
        } = self;
        let started = Instant::now();
        layout.ensure_dirs()?;

        let mut sink = JsonLinesErrorSink::new(layout.error_path(&context.run_id));
        let baseline = FileBaseline::new(layout.baseline_path(), layout.marker_path());

        let changes_path = layout.changes_path();
        if !config.incremental && changes_path.exists() {
            let source = JsonLinesSource::open(&changes_path)
                .map_err(|err| abort_unreadable(layout, &context, started, &changes_path, err))?;
            let mut baseline = baseline;
            return Reconciler::new(config, handler, &mut sink, &mut baseline)
                .with_context(context)
                .with_stop_signal(stop)
                .run(RunInput::changes(source))
                .map_err(|err| quarantine_unreadable(layout, &changes_path, err));
        }

        let current_path = current.unwrap_or_else(|| layout.current_path());
        let baseline_path = layout.baseline_path();
        let current = read_snapshot(&current_path)
            .map_err(|err| abort_unreadable(layout, &context, started, &current_path, err))?;
        let previous = read_snapshot_or_empty(&baseline_path)
            .map_err(|err| abort_unreadable(layout, &context, started, &baseline_path, err))?;
        let mut baseline = baseline.with_current(&current_path);

        Reconciler::new(config, handler, &mut sink, &mut baseline)
            .with_context(context)
            .with_stop_signal(stop)
            .run(RunInput::snapshots(previous, current))
    }
}

/// An input file failed to open or load before the reconciler started: stamp the
/// run, report it like any other aborted run and quarantine the file.
fn abort_unreadable(
    layout: &FileLayout,
    context: &RunContext,
    started: Instant,
    input: &Path,
    err: ExError,
) -> ExError {
    let err = err.with_run_id(context.run_id.clone());
    log_op_error!(
        "reconcile",
        err.clone(),
        duration_ms = started.elapsed().as_millis() as u64,
        run_id = %context.run_id,
        task = %context.task.as_deref().unwrap_or_default()
    );
    quarantine_unreadable(layout, input, err)
}

/// Move an input file the run could not read into the error folder.
fn quarantine_unreadable(layout: &FileLayout, input: &Path, err: ExError) -> ExError {
    if !matches!(err.kind(), ExErrorKind::SourceRead | ExErrorKind::Io) || !input.exists() {
        return err;
    }
    let Some(run_id) = err.run_id().cloned() else {
        return err;
    };
    if let Err(move_err) = layout.quarantine(input, &run_id) {
        tracing::error!(
            run_id = %run_id,
            err_code = move_err.code(),
            err_message = move_err.message(),
            "quarantine failed"
        );
    }
    err
}
