//! Snapshot diff command

use std::path::PathBuf;

use clap::Args;
use idsync_core::diff::{compute_changes_with, render_summary, DiffOptions};
use idsync_core::KeySpec;
use idsync_store::{read_snapshot, read_snapshot_or_empty, write_changes};

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Baseline snapshot (JSON Lines); a missing file is an empty baseline
    #[arg(long)]
    pub baseline: PathBuf,

    /// Current snapshot (JSON Lines)
    #[arg(long)]
    pub current: PathBuf,

    /// Identifier field of the natural key, repeat for a compound key
    #[arg(long = "key", required = true)]
    pub key: Vec<String>,

    #[arg(long, default_value = "|")]
    pub separator: String,

    /// Field compared for UPDATE detection, repeatable; default compares all
    #[arg(long = "compare")]
    pub compare: Vec<String>,

    /// Write the change set here as JSON Lines
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Keys listed per change kind in the summary
    #[arg(long, default_value_t = 20)]
    pub max_keys: usize,
}

pub fn execute(args: DiffArgs) -> Result<(), Box<dyn std::error::Error>> {
    let spec = KeySpec::new(args.key).with_separator(args.separator);
    let baseline = read_snapshot_or_empty(&args.baseline)?;
    let current = read_snapshot(&args.current)?;
    let options = DiffOptions {
        compare_fields: args.compare,
    };

    let changes = compute_changes_with(baseline, current, &spec, &options)?;

    if let Some(out) = &args.out {
        write_changes(out, &changes.entries)?;
    }
    print!("{}", render_summary(&changes, args.max_keys));
    Ok(())
}
