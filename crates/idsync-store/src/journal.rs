//! Journal handler: a file-backed stand-in for the downstream repository.
//!
//! Every applied change is appended to a JSON Lines journal. The handler
//! knows which keys exist downstream (the baseline keys plus whatever it
//! applied during the run), which is enough to report missing owners for an
//! owner reference field such as `manager`.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use idsync_core::{ChangeEntry, ChangeKind, HandleOutcome, NaturalKey, RecordHandler};

use crate::errors::{io_error, Result};

pub struct JournalHandler {
    out: BufWriter<File>,
    path: PathBuf,
    owner_field: Option<String>,
    known: HashSet<NaturalKey>,
    applied: u64,
}

impl JournalHandler {
    /// Open the journal for appending, creating it if needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("open_journal", parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error("open_journal", path, e))?;
        Ok(Self {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            owner_field: None,
            known: HashSet::new(),
            applied: 0,
        })
    }

    /// Field holding the natural key of the record's owner
    pub fn with_owner_field(mut self, field: impl Into<String>) -> Self {
        self.owner_field = Some(field.into());
        self
    }

    /// Keys already present downstream before the run
    pub fn with_known_keys<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = NaturalKey>,
    {
        self.known.extend(keys);
        self
    }

    /// Changes journaled so far
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Flush the journal. Returns the number of changes journaled.
    pub fn finish(mut self) -> Result<u64> {
        self.out
            .flush()
            .map_err(|e| io_error("flush_journal", &self.path, e))?;
        Ok(self.applied)
    }

    fn missing_owner(&self, entry: &ChangeEntry) -> Option<NaturalKey> {
        let field = self.owner_field.as_deref()?;
        let owner = entry.payload.get(field)?.as_key_component();
        if owner.trim().is_empty() || owner == entry.natural_key.as_str() {
            return None;
        }
        let owner = NaturalKey::new(owner);
        (!self.known.contains(&owner)).then_some(owner)
    }

    fn append(&mut self, entry: &ChangeEntry) -> std::result::Result<(), String> {
        serde_json::to_writer(&mut self.out, entry).map_err(|e| e.to_string())?;
        self.out.write_all(b"\n").map_err(|e| e.to_string())
    }
}

impl RecordHandler for JournalHandler {
    fn handle(&mut self, entry: &ChangeEntry) -> HandleOutcome {
        match entry.kind {
            ChangeKind::Delete if !self.known.contains(&entry.natural_key) => {
                return HandleOutcome::Ignored;
            }
            ChangeKind::Delete => {}
            ChangeKind::Create | ChangeKind::Update => {
                if let Some(owner) = self.missing_owner(entry) {
                    return HandleOutcome::MissingOwner(owner);
                }
            }
        }

        if let Err(reason) = self.append(entry) {
            return HandleOutcome::HardFailure(format!(
                "journal write to {} failed: {}",
                self.path.display(),
                reason
            ));
        }

        if entry.kind == ChangeKind::Delete {
            self.known.remove(&entry.natural_key);
        } else {
            self.known.insert(entry.natural_key.clone());
        }
        self.applied += 1;
        HandleOutcome::Success
    }
}
