//! Windowed batch reading of change sequences.
//!
//! A [`WindowedReader`] pulls change entries from a [`ChangeSource`] in
//! blocks of at most `size` entries. Only the block being handed out is held
//! in memory, so peak memory is bounded by the window size rather than by the
//! size of the change file.

use std::collections::VecDeque;

use crate::errors::ExError;
use crate::model::ChangeEntry;

/// A lazily read, forward-only sequence of change entries
pub trait ChangeSource {
    /// Read the next entry, `Ok(None)` at end of source.
    ///
    /// # Errors
    ///
    /// Returns `SourceRead` for a malformed entry or `Io` when the underlying
    /// resource fails. A source must stay usable after a malformed entry.
    fn read_next(&mut self) -> Result<Option<ChangeEntry>, ExError>;

    /// Release the underlying resource. Called once, at exhaustion.
    fn release(&mut self) {}

    /// Label used in logs and error messages
    fn describe(&self) -> String {
        "change source".to_string()
    }
}

impl<S: ChangeSource + ?Sized> ChangeSource for Box<S> {
    fn read_next(&mut self) -> Result<Option<ChangeEntry>, ExError> {
        (**self).read_next()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// In-memory change source
#[derive(Debug, Default)]
pub struct VecSource {
    entries: VecDeque<ChangeEntry>,
    label: String,
}

impl VecSource {
    pub fn new(entries: Vec<ChangeEntry>) -> Self {
        Self {
            entries: entries.into(),
            label: "in-memory".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ChangeSource for VecSource {
    fn read_next(&mut self) -> Result<Option<ChangeEntry>, ExError> {
        Ok(self.entries.pop_front())
    }

    fn release(&mut self) {
        self.entries = VecDeque::new();
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl From<Vec<ChangeEntry>> for VecSource {
    fn from(entries: Vec<ChangeEntry>) -> Self {
        Self::new(entries)
    }
}

/// Reads a change source window by window.
///
/// End of source is reported through [`exhausted`](Self::exhausted), never
/// through an error. When the source fails mid-window, the entries already
/// read for that window are kept and handed out, exactly once, by the next
/// call.
pub struct WindowedReader<S: ChangeSource> {
    source: S,
    carry: Vec<ChangeEntry>,
    exhausted: bool,
    windows_delivered: u64,
    entries_delivered: u64,
}

impl<S: ChangeSource> WindowedReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            carry: Vec::new(),
            exhausted: false,
            windows_delivered: 0,
            entries_delivered: 0,
        }
    }

    /// Read up to `size` entries in source order.
    ///
    /// A `size` of zero is treated as one. Once the source is exhausted every
    /// call returns an empty window.
    ///
    /// # Errors
    ///
    /// Propagates the source's `SourceRead`/`Io` error.
    pub fn next_window(&mut self, size: usize) -> Result<Vec<ChangeEntry>, ExError> {
        let size = size.max(1);
        let mut window = std::mem::take(&mut self.carry);

        while !self.exhausted && window.len() < size {
            match self.source.read_next() {
                Ok(Some(entry)) => window.push(entry),
                Ok(None) => self.finish(),
                Err(err) => {
                    self.carry = window;
                    return Err(err);
                }
            }
        }

        if !window.is_empty() {
            self.windows_delivered += 1;
            self.entries_delivered += window.len() as u64;
        }
        Ok(window)
    }

    /// True once the end of the source has been reached and every read
    /// entry has been handed out.
    pub fn exhausted(&self) -> bool {
        self.exhausted && self.carry.is_empty()
    }

    /// Number of nonempty windows handed out so far
    pub fn windows_delivered(&self) -> u64 {
        self.windows_delivered
    }

    /// Number of entries handed out so far
    pub fn entries_delivered(&self) -> u64 {
        self.entries_delivered
    }

    /// True when the source turned out to hold nothing at all
    pub fn was_empty(&self) -> bool {
        self.exhausted() && self.entries_delivered == 0
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    fn finish(&mut self) {
        if !self.exhausted {
            self.exhausted = true;
            self.source.release();
        }
    }
}
