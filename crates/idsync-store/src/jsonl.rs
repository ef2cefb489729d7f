//! JSON Lines snapshot and change files.
//!
//! One JSON object per line; blank lines are skipped. Line numbers in errors
//! are 1-based and count blank lines.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use idsync_core::{ChangeEntry, ChangeSource, ExError, Record};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::atomic::atomic_write;
use crate::errors::{io_error, malformed_line, serialization_error, Result};

/// Forward-only reader of JSON Lines values
pub struct JsonLinesReader<R: BufRead> {
    reader: R,
    name: String,
    line: u64,
    buf: Vec<u8>,
}

impl JsonLinesReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| io_error("open_jsonl", path, e))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead> JsonLinesReader<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line: 0,
            buf: Vec::new(),
        }
    }

    /// Line number of the value last returned
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the next value, `Ok(None)` at end of input.
    ///
    /// A malformed line, invalid UTF-8 included, is reported once; the next
    /// call continues after it.
    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .map_err(|e| io_error("read_jsonl", Path::new(&self.name), e))?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return serde_json::from_slice(&self.buf)
                .map(Some)
                .map_err(|e| malformed_line(&self.name, self.line, &e));
        }
    }
}

/// Read a whole snapshot file
///
/// # Errors
///
/// - `Io`: the file cannot be opened or read
/// - `SourceRead`: a line is not a flat JSON object
pub fn read_snapshot(path: &Path) -> Result<Vec<Record>> {
    let mut reader = JsonLinesReader::open(path)?;
    let mut records = Vec::new();
    while let Some(record) = reader.read_value::<Record>()? {
        records.push(record);
    }
    tracing::debug!(path = %path.display(), records = records.len(), "snapshot read");
    Ok(records)
}

/// Read a snapshot file, treating a missing file as an empty snapshot
pub fn read_snapshot_or_empty(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no baseline snapshot, starting empty");
        return Ok(Vec::new());
    }
    read_snapshot(path)
}

fn encode_lines<T: Serialize>(items: &[T]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for item in items {
        serde_json::to_writer(&mut out, item).map_err(|e| serialization_error("encode_jsonl", e))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Atomically write records as a snapshot file
pub fn write_snapshot(path: &Path, records: &[Record]) -> Result<()> {
    atomic_write(path, &encode_lines(records)?)
}

/// Atomically write a change set as a change file
pub fn write_changes(path: &Path, entries: &[ChangeEntry]) -> Result<()> {
    atomic_write(path, &encode_lines(entries)?)
}

/// Change file read lazily, one line at a time
pub struct JsonLinesSource<R: BufRead> {
    reader: Option<JsonLinesReader<R>>,
    name: String,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_reader(JsonLinesReader::open(path)?))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn from_reader(reader: JsonLinesReader<R>) -> Self {
        let name = reader.name().to_string();
        Self {
            reader: Some(reader),
            name,
        }
    }
}

impl<R: BufRead> ChangeSource for JsonLinesSource<R> {
    fn read_next(&mut self) -> std::result::Result<Option<ChangeEntry>, ExError> {
        match self.reader.as_mut() {
            Some(reader) => reader.read_value(),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(source = %self.name, "change file released");
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
