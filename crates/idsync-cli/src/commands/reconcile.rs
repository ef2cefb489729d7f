//! Reconciliation run command

use std::path::PathBuf;

use clap::Args;
use idsync_core::{KeyOf, RunConfig};
use idsync_core_types::RunContext;
use idsync_store::{read_snapshot_or_empty, FileLayout, JournalHandler, TaskRun};

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Run configuration (TOML)
    #[arg(long)]
    pub config: PathBuf,

    /// Root of the data/working/error/proceed folders
    #[arg(long)]
    pub root: PathBuf,

    /// Task name; defaults to the configuration file stem
    #[arg(long)]
    pub task: Option<String>,

    /// Current snapshot, instead of data/<task>.current.jsonl
    #[arg(long)]
    pub current: Option<PathBuf>,

    /// Field naming the owner of a record (e.g. manager)
    #[arg(long)]
    pub owner_field: Option<String>,
}

pub fn execute(args: ReconcileArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&args.config)?;
    let config = RunConfig::from_toml_str(&text)?;

    let task = match args.task {
        Some(task) => task,
        None => args
            .config
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or("Cannot derive a task name from --config; pass --task")?,
    };
    let layout = FileLayout::new(&args.root, task.clone());

    // The journal knows what the last committed run left downstream.
    let known: Vec<_> = read_snapshot_or_empty(&layout.baseline_path())?
        .iter()
        .map(|r| config.key.key_of(r))
        .collect();
    let mut handler = JournalHandler::open(&layout.journal_path())?.with_known_keys(known);
    if let Some(field) = args.owner_field {
        handler = handler.with_owner_field(field);
    }

    let mut run = TaskRun::new(&layout, config).with_context(RunContext::new().with_task(task));
    if let Some(current) = args.current {
        run = run.with_current(current);
    }

    let outcome = run.run(&mut handler);
    let journaled = handler.finish()?;
    let summary = outcome?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    eprintln!(
        "Journaled {} changes to {}",
        journaled,
        layout.journal_path().display()
    );
    Ok(())
}
