//! File-backed baseline commit.

use std::fs;
use std::path::{Path, PathBuf};

use idsync_core::sink::{BaselineCommit, BaselineMarker};
use idsync_core::ExError;

use crate::atomic::{atomic_copy, atomic_write};
use crate::errors::{commit_error, io_error, serialization_error, Result};

/// Commits a run by promoting the current snapshot to baseline and writing
/// the proceed marker.
///
/// Both steps are temp-file + rename. The snapshot is promoted first, so a
/// marker on disk always describes the baseline next to it.
#[derive(Debug, Clone)]
pub struct FileBaseline {
    baseline: PathBuf,
    marker: PathBuf,
    current: Option<PathBuf>,
}

impl FileBaseline {
    pub fn new(baseline: impl Into<PathBuf>, marker: impl Into<PathBuf>) -> Self {
        Self {
            baseline: baseline.into(),
            marker: marker.into(),
            current: None,
        }
    }

    /// Snapshot copied over the baseline on commit
    pub fn with_current(mut self, current: impl Into<PathBuf>) -> Self {
        self.current = Some(current.into());
        self
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }
}

impl BaselineCommit for FileBaseline {
    fn commit(&mut self, marker: &BaselineMarker) -> std::result::Result<(), ExError> {
        if let Some(current) = &self.current {
            atomic_copy(current, &self.baseline)
                .map_err(|e| commit_error(&self.baseline, &e).with_source(e))?;
        }

        let body = serde_json::to_vec_pretty(marker)
            .map_err(|e| serialization_error("encode_marker", e))?;
        atomic_write(&self.marker, &body)
            .map_err(|e| commit_error(&self.marker, &e).with_source(e))?;

        tracing::info!(
            run_id = %marker.run_id,
            marker = %self.marker.display(),
            record_count = marker.record_count,
            "baseline committed"
        );
        Ok(())
    }
}

/// Read the proceed marker, `None` if no run has committed yet
pub fn read_marker(path: &Path) -> Result<Option<BaselineMarker>> {
    if !path.exists() {
        return Ok(None);
    }
    let body = fs::read(path).map_err(|e| io_error("read_marker", path, e))?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| serialization_error("decode_marker", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use idsync_core_types::RunId;
    use tempfile::TempDir;

    #[test]
    fn test_commit_promotes_snapshot_and_writes_marker() {
        let dir = TempDir::new().unwrap();
        let current = dir.path().join("current.jsonl");
        let baseline_path = dir.path().join("baseline.jsonl");
        let marker_path = dir.path().join("proceed").join("users.proceed.json");
        fs::write(&current, "{\"id\":\"u1\"}\n").unwrap();

        let mut baseline = FileBaseline::new(&baseline_path, &marker_path).with_current(&current);
        let marker = BaselineMarker::new(RunId::new(), Some("abc".to_string()), 1);
        baseline.commit(&marker).unwrap();

        assert_eq!(fs::read_to_string(&baseline_path).unwrap(), "{\"id\":\"u1\"}\n");
        let stored = read_marker(&marker_path).unwrap().unwrap();
        assert_eq!(stored, marker);
    }

    #[test]
    fn test_missing_current_is_a_commit_error() {
        let dir = TempDir::new().unwrap();
        let mut baseline = FileBaseline::new(dir.path().join("b.jsonl"), dir.path().join("m.json"))
            .with_current(dir.path().join("absent.jsonl"));

        let err = baseline
            .commit(&BaselineMarker::new(RunId::new(), None, 0))
            .unwrap_err();

        assert_eq!(err.kind(), idsync_core::ExErrorKind::Commit);
        assert!(read_marker(&dir.path().join("m.json")).unwrap().is_none());
    }
}
