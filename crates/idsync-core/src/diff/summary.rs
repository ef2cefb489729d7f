//! Human-readable rendering of a change set.

use crate::diff::model::ChangeSet;
use crate::model::ChangeKind;

/// Render a short text summary of a [`ChangeSet`] for operators.
///
/// At most `max_keys` keys are listed per change kind.
pub fn render_summary(changes: &ChangeSet, max_keys: usize) -> String {
    let stats = &changes.stats;
    let mut out = String::new();

    if changes.is_identical() {
        out.push_str(&format!(
            "Snapshots are identical ({} unchanged records)\n",
            stats.unchanged
        ));
        return out;
    }

    out.push_str(&format!(
        "{} changes: {} created, {} updated, {} deleted, {} unchanged\n",
        stats.changes(),
        stats.created,
        stats.updated,
        stats.deleted,
        stats.unchanged
    ));

    for kind in [ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete] {
        let keys: Vec<&str> = changes
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.natural_key.as_str())
            .collect();
        if keys.is_empty() {
            continue;
        }
        let shown = keys.iter().take(max_keys).copied().collect::<Vec<_>>().join(", ");
        if keys.len() > max_keys {
            out.push_str(&format!(
                "  {}: {} (+{} more)\n",
                kind,
                shown,
                keys.len() - max_keys
            ));
        } else {
            out.push_str(&format!("  {}: {}\n", kind, shown));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::model::DiffStats;
    use crate::model::{ChangeEntry, Record};

    #[test]
    fn test_identical_summary() {
        let changes = ChangeSet {
            entries: vec![],
            stats: DiffStats {
                unchanged: 4,
                ..DiffStats::default()
            },
        };
        assert_eq!(
            render_summary(&changes, 5),
            "Snapshots are identical (4 unchanged records)\n"
        );
    }

    #[test]
    fn test_summary_truncates_key_lists() {
        let entries = (0..4)
            .map(|i| ChangeEntry::create(format!("u{}", i), Record::new()))
            .collect();
        let changes = ChangeSet {
            entries,
            stats: DiffStats {
                created: 4,
                ..DiffStats::default()
            },
        };
        let text = render_summary(&changes, 2);
        assert!(text.starts_with("4 changes: 4 created"));
        assert!(text.contains("CREATE: u0, u1 (+2 more)"));
        assert!(!text.contains("UPDATE"));
    }
}
