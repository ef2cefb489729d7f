//! Folder layout of a reconciliation task.
//!
//! ```text
//! <root>/data/<task>.current.jsonl     snapshot extracted for this run
//! <root>/data/<task>.baseline.jsonl    snapshot of the last committed run
//! <root>/working/<task>.changes.jsonl  full change file (full-replace mode)
//! <root>/working/journal.jsonl         changes applied by the journal handler
//! <root>/error/<task>.<run_id>.errors.jsonl
//! <root>/proceed/<task>.proceed.json   baseline marker
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use idsync_core_types::RunId;

use crate::errors::{io_error, Result};

#[derive(Debug, Clone)]
pub struct FileLayout {
    root: PathBuf,
    task: String,
}

impl FileLayout {
    pub fn new(root: impl Into<PathBuf>, task: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            task: task.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn working_dir(&self) -> PathBuf {
        self.root.join("working")
    }

    pub fn error_dir(&self) -> PathBuf {
        self.root.join("error")
    }

    pub fn proceed_dir(&self) -> PathBuf {
        self.root.join("proceed")
    }

    pub fn current_path(&self) -> PathBuf {
        self.data_dir().join(format!("{}.current.jsonl", self.task))
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir().join(format!("{}.baseline.jsonl", self.task))
    }

    pub fn changes_path(&self) -> PathBuf {
        self.working_dir().join(format!("{}.changes.jsonl", self.task))
    }

    pub fn journal_path(&self) -> PathBuf {
        self.working_dir().join("journal.jsonl")
    }

    pub fn error_path(&self, run_id: &RunId) -> PathBuf {
        self.error_dir()
            .join(format!("{}.{}.errors.jsonl", self.task, run_id))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.proceed_dir().join(format!("{}.proceed.json", self.task))
    }

    /// Create every folder of the layout
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.data_dir(),
            self.working_dir(),
            self.error_dir(),
            self.proceed_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| io_error("create_layout", &dir, e))?;
        }
        Ok(())
    }

    /// Move an aborted run's input file into the error folder.
    ///
    /// Returns where the file ended up.
    pub fn quarantine(&self, input: &Path, run_id: &RunId) -> Result<PathBuf> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let target = self.error_dir().join(format!("{}.{}", run_id, name));

        let error_dir = self.error_dir();
        fs::create_dir_all(&error_dir).map_err(|e| io_error("quarantine", &error_dir, e))?;
        fs::rename(input, &target).map_err(|e| io_error("quarantine", input, e))?;

        tracing::warn!(
            run_id = %run_id,
            from = %input.display(),
            to = %target.display(),
            "input quarantined"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_per_task() {
        let layout = FileLayout::new("/srv/idsync", "users");
        assert_eq!(
            layout.baseline_path(),
            Path::new("/srv/idsync/data/users.baseline.jsonl")
        );
        assert_eq!(
            layout.marker_path(),
            Path::new("/srv/idsync/proceed/users.proceed.json")
        );
        let run_id = RunId::from_string("r1".to_string());
        assert_eq!(
            layout.error_path(&run_id),
            Path::new("/srv/idsync/error/users.r1.errors.jsonl")
        );
    }

    #[test]
    fn test_quarantine_moves_input() {
        let dir = TempDir::new().unwrap();
        let layout = FileLayout::new(dir.path(), "users");
        layout.ensure_dirs().unwrap();
        fs::write(layout.changes_path(), "garbage\n").unwrap();
        let run_id = RunId::from_string("r9".to_string());

        let moved = layout.quarantine(&layout.changes_path(), &run_id).unwrap();

        assert!(!layout.changes_path().exists());
        assert_eq!(moved, layout.error_dir().join("r9.users.changes.jsonl"));
        assert_eq!(fs::read_to_string(moved).unwrap(), "garbage\n");
    }
}
