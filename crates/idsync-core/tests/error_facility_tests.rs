use idsync_core::errors::{ExError, ExErrorKind, ReconError};
use idsync_core_types::RunId;

#[test]
fn test_ambiguous_key_verifiable_by_kind() {
    let err = ReconError::AmbiguousKey {
        natural_key: "u1".to_string(),
        snapshot: "current".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::AmbiguousKey);
    assert_eq!(ex_err.code(), "ERR_AMBIGUOUS_KEY");
    assert_eq!(ex_err.entity_id(), Some("u1"));
    assert_eq!(ex_err.op(), Some("diff"));
}

#[test]
fn test_blank_key_is_soft() {
    let err = ReconError::BlankKey {
        fields: "lookup,code".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::InvalidKey);
    assert!(!ex_err.is_fatal());
    assert!(ex_err.message().contains("lookup,code"));
}

#[test]
fn test_invalid_config_structured_fields() {
    let err = ReconError::InvalidConfig {
        reason: "bulk_size must be greater than zero".to_string(),
    };

    let ex_err: ExError = ExError::from(err).with_op("validate_config");

    assert_eq!(ex_err.kind(), ExErrorKind::InvalidConfig);
    assert_eq!(ex_err.code(), "ERR_INVALID_CONFIG");
    assert_eq!(ex_err.op(), Some("validate_config"));
    assert!(ex_err.is_fatal());
}

#[test]
fn test_sink_and_commit_conversions() {
    let sink: ExError = ReconError::SinkWrite {
        reason: "disk full".to_string(),
    }
    .into();
    let commit: ExError = ReconError::Commit {
        reason: "rename failed".to_string(),
    }
    .into();

    assert_eq!(sink.code(), "ERR_SINK_WRITE");
    assert_eq!(commit.code(), "ERR_COMMIT");
    assert!(commit.message().contains("rename failed"));
}

#[test]
fn test_serde_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();

    let ex_err: ExError = ReconError::from(json_err).into();

    assert_eq!(ex_err.kind(), ExErrorKind::Serialization);
    assert_eq!(ex_err.code(), "ERR_SERIALIZATION");
}

#[test]
fn test_ex_error_builder_pattern() {
    let run_id = RunId::new();
    let ex_err = ExError::new(ExErrorKind::SourceRead)
        .with_op("read_jsonl")
        .with_entity_id("changes.jsonl")
        .with_line(12)
        .with_message("expected `:`")
        .with_run_id(run_id.clone());

    assert_eq!(ex_err.op(), Some("read_jsonl"));
    assert_eq!(ex_err.entity_id(), Some("changes.jsonl"));
    assert_eq!(ex_err.line(), Some(12));
    assert_eq!(ex_err.run_id(), Some(&run_id));
}

#[test]
fn test_ex_error_display() {
    let ex_err = ExError::new(ExErrorKind::AmbiguousKey)
        .with_op("diff")
        .with_entity_id("u7")
        .with_message("duplicate natural key in current snapshot");

    let display_str = format!("{}", ex_err);

    assert_eq!(
        display_str,
        "[ERR_AMBIGUOUS_KEY] in operation 'diff': duplicate natural key in current snapshot (entity_id: u7)"
    );
}

#[test]
fn test_all_error_kinds_have_unique_codes() {
    use std::collections::HashSet;

    let kinds = vec![
        ExErrorKind::AmbiguousKey,
        ExErrorKind::SourceRead,
        ExErrorKind::InvalidKey,
        ExErrorKind::InvalidConfig,
        ExErrorKind::SinkWrite,
        ExErrorKind::Commit,
        ExErrorKind::Io,
        ExErrorKind::Serialization,
        ExErrorKind::Internal,
    ];

    let codes: HashSet<_> = kinds.iter().map(|k| k.code()).collect();

    assert_eq!(codes.len(), kinds.len());
    for code in codes {
        assert!(code.starts_with("ERR_"));
    }
}
