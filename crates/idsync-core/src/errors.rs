use idsync_core_types::RunId;
use thiserror::Error;

/// Result type alias using ReconError
pub type Result<T> = std::result::Result<T, ReconError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure the engine can surface maps to exactly one kind, and every
/// kind maps to a stable `ERR_*` code used by logs, run reports and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input
    /// Two records in one snapshot share a natural key
    AmbiguousKey,
    /// A snapshot or change source yielded a malformed record
    SourceRead,
    /// A record carries a blank or malformed natural key
    InvalidKey,

    // Configuration
    InvalidConfig,

    // Collaborators
    /// The error sink refused a write
    SinkWrite,
    /// The baseline marker could not be committed
    Commit,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::AmbiguousKey => "ERR_AMBIGUOUS_KEY",
            ExErrorKind::SourceRead => "ERR_SOURCE_READ",
            ExErrorKind::InvalidKey => "ERR_INVALID_KEY",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::SinkWrite => "ERR_SINK_WRITE",
            ExErrorKind::Commit => "ERR_COMMIT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether an error of this kind aborts the whole run.
    ///
    /// Only per-record key problems are soft; they are counted as hard
    /// failures of the record and the run continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExErrorKind::InvalidKey)
    }
}

/// Canonical structured error type
///
/// Carries classification fields for programmatic handling and context for
/// the run report.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    line: Option<u64>,
    run_id: Option<RunId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            line: None,
            run_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context (usually a natural key)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add source line context (1-based)
    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    /// Add run correlation context
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Whether this error aborts the run
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the source line context, if any
    pub fn line(&self) -> Option<u64> {
        self.line
    }

    /// Get the run correlation context, if any
    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line: {})", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the reconciliation engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// Natural key appears more than once in one snapshot
    #[error("Ambiguous natural key {natural_key} in {snapshot} snapshot")]
    AmbiguousKey {
        natural_key: String,
        snapshot: String,
    },

    /// A source produced a record that could not be decoded
    #[error("Failed to read record from {source_name}: {reason}")]
    SourceRead {
        source_name: String,
        line: Option<u64>,
        reason: String,
    },

    /// A record has an empty or malformed natural key
    #[error("Record has blank natural key (fields: {fields})")]
    BlankKey { fields: String },

    /// Run configuration failed validation
    #[error("Invalid run configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The error sink could not accept the residue
    #[error("Error sink write failed: {reason}")]
    SinkWrite { reason: String },

    /// Baseline marker commit failed
    #[error("Baseline commit failed: {reason}")]
    Commit { reason: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal invariant breach
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<ReconError> for ExError {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::AmbiguousKey {
                natural_key,
                snapshot,
            } => ExError::new(ExErrorKind::AmbiguousKey)
                .with_op("diff")
                .with_entity_id(natural_key)
                .with_message(format!("duplicate natural key in {} snapshot", snapshot)),

            ReconError::SourceRead {
                source_name,
                line,
                reason,
            } => {
                let err = ExError::new(ExErrorKind::SourceRead)
                    .with_op("read_source")
                    .with_message(format!("{}: {}", source_name, reason));
                match line {
                    Some(line) => err.with_line(line),
                    None => err,
                }
            }

            ReconError::BlankKey { fields } => ExError::new(ExErrorKind::InvalidKey)
                .with_op("natural_key")
                .with_message(format!("blank natural key over fields [{}]", fields)),

            ReconError::InvalidConfig { reason } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(reason)
            }

            ReconError::SinkWrite { reason } => ExError::new(ExErrorKind::SinkWrite)
                .with_op("error_sink")
                .with_message(reason),

            ReconError::Commit { reason } => ExError::new(ExErrorKind::Commit)
                .with_op("commit_baseline")
                .with_message(reason),

            ReconError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            ReconError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to ReconError
impl From<serde_json::Error> for ReconError {
    fn from(err: serde_json::Error) -> Self {
        ReconError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::AmbiguousKey, "ERR_AMBIGUOUS_KEY"),
            (ExErrorKind::SourceRead, "ERR_SOURCE_READ"),
            (ExErrorKind::InvalidKey, "ERR_INVALID_KEY"),
            (ExErrorKind::InvalidConfig, "ERR_INVALID_CONFIG"),
            (ExErrorKind::SinkWrite, "ERR_SINK_WRITE"),
            (ExErrorKind::Commit, "ERR_COMMIT"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_only_key_errors_are_soft() {
        assert!(!ExErrorKind::InvalidKey.is_fatal());
        assert!(ExErrorKind::AmbiguousKey.is_fatal());
        assert!(ExErrorKind::SourceRead.is_fatal());
        assert!(ExErrorKind::Io.is_fatal());
    }

    #[test]
    fn test_source_read_keeps_line() {
        let err: ExError = ReconError::SourceRead {
            source_name: "changes.jsonl".to_string(),
            line: Some(7),
            reason: "expected value".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::SourceRead);
        assert_eq!(err.line(), Some(7));
        assert!(err.to_string().contains("(line: 7)"));
    }

    #[test]
    fn test_display_includes_code_and_entity() {
        let err: ExError = ReconError::AmbiguousKey {
            natural_key: "u1".to_string(),
            snapshot: "current".to_string(),
        }
        .into();
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_AMBIGUOUS_KEY]"));
        assert!(rendered.contains("(entity_id: u1)"));
    }

    #[test]
    fn test_std_error_source_chain() {
        use std::error::Error as _;
        let inner = ExError::new(ExErrorKind::Io).with_message("disk full");
        let outer = ExError::new(ExErrorKind::SinkWrite).with_source(inner);
        let source = outer.source().expect("source should be present");
        assert!(source.to_string().contains("disk full"));
    }
}
