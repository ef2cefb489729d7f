//! Error file sink.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use idsync_core::sink::{ErrorSink, SinkItem};
use idsync_core::ExError;

use crate::errors::{serialization_error, sink_write_error};

/// Appends residue to a JSON Lines error file, one item per line.
///
/// The file is created on the first write, so a clean run leaves no error
/// file behind.
#[derive(Debug, Clone)]
pub struct JsonLinesErrorSink {
    path: PathBuf,
    written: u64,
}

impl JsonLinesErrorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Items written through this sink
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl ErrorSink for JsonLinesErrorSink {
    fn write(&mut self, items: &[SinkItem]) -> Result<(), ExError> {
        if items.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| sink_write_error(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| sink_write_error(&self.path, e))?;

        let mut out = BufWriter::new(file);
        for item in items {
            serde_json::to_writer(&mut out, item)
                .map_err(|e| serialization_error("error_sink_encode", e))?;
            out.write_all(b"\n")
                .map_err(|e| sink_write_error(&self.path, e))?;
        }
        out.flush().map_err(|e| sink_write_error(&self.path, e))?;

        self.written += items.len() as u64;
        tracing::info!(
            path = %self.path.display(),
            items = items.len(),
            "residue written to error file"
        );
        Ok(())
    }
}
