//! Run configuration.
//!
//! A run is configured once, validated before it starts, and never mutated
//! afterwards. Configuration is usually loaded from the TOML file of the
//! scheduled task:
//!
//! ```toml
//! bulk_size = 500
//! max_attempts = 4
//! mode = "trusted"
//! incremental = true
//!
//! [key]
//! fields = ["lookup", "code"]
//! separator = "~"
//! ```

use serde::{Deserialize, Serialize};

use crate::diff::DiffOptions;
use crate::errors::{ExError, ReconError};
use crate::model::KeySpec;

/// How many passes a run may take over its change sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Authoritative source: multi-pass with dependency resolution
    #[default]
    Trusted,
    /// Account source: a single pass, deferred records become residue
    Target,
}

impl RunMode {
    /// Upper bound on passes for a run of this mode
    pub fn max_passes(&self, max_attempts: u32) -> u32 {
        match self {
            RunMode::Trusted => max_attempts.max(1),
            RunMode::Target => 1,
        }
    }
}

fn default_bulk_size() -> usize {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_incremental() -> bool {
    true
}

fn default_commit_when_stopped() -> bool {
    true
}

/// Configuration of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Window size of the batch reader
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    /// Retry budget for dependency resolution
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub mode: RunMode,
    /// Diff against the baseline (`true`) or replay a full change file
    #[serde(default = "default_incremental")]
    pub incremental: bool,
    /// Natural-key definition
    pub key: KeySpec,
    /// Fields compared for UPDATE detection; empty compares all
    #[serde(default)]
    pub compare_fields: Vec<String>,
    /// Commit the baseline even when a stop request cut the run short
    #[serde(default = "default_commit_when_stopped")]
    pub commit_when_stopped: bool,
}

impl RunConfig {
    pub fn new(key: KeySpec) -> Self {
        Self {
            bulk_size: default_bulk_size(),
            max_attempts: default_max_attempts(),
            mode: RunMode::default(),
            incremental: default_incremental(),
            key,
            compare_fields: Vec::new(),
            commit_when_stopped: default_commit_when_stopped(),
        }
    }

    pub fn with_bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_compare_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compare_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate a TOML configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig`: malformed TOML or a value rejected by [`validate`](Self::validate)
    pub fn from_toml_str(text: &str) -> Result<Self, ExError> {
        let config: RunConfig = toml::from_str(text).map_err(|e| {
            ExError::from(ReconError::InvalidConfig {
                reason: e.to_string(),
            })
            .with_op("load_config")
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before a run starts.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig`: zero window size or retry budget, no key fields,
    ///   a blank key field name, or an empty separator with a compound key
    pub fn validate(&self) -> Result<(), ExError> {
        let reject = |reason: &str| -> Result<(), ExError> {
            Err(ExError::from(ReconError::InvalidConfig {
                reason: reason.to_string(),
            })
            .with_op("validate_config"))
        };

        if self.bulk_size == 0 {
            return reject("bulk_size must be greater than zero");
        }
        if self.max_attempts == 0 {
            return reject("max_attempts must be at least 1");
        }
        if self.key.fields.is_empty() {
            return reject("key.fields must name at least one identifier field");
        }
        if self.key.fields.iter().any(|f| f.trim().is_empty()) {
            return reject("key.fields must not contain blank field names");
        }
        if self.key.fields.len() > 1 && self.key.separator.is_empty() {
            return reject("key.separator must not be empty for a compound key");
        }
        Ok(())
    }

    /// Upper bound on passes for this run
    pub fn max_passes(&self) -> u32 {
        self.mode.max_passes(self.max_attempts)
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            compare_fields: self.compare_fields.clone(),
        }
    }
}
