//! Change set computation engine.
//!
//! Both snapshots are indexed by natural key and then walked together in key
//! order, the same way a sorted-merge comparison of two extracts works, so
//! the output order never depends on the order of the input files.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::time::Instant;

use crate::diff::model::{ChangeSet, DiffOptions, DiffStats};
use crate::errors::{ExError, ReconError};
use crate::model::{ChangeEntry, KeyOf, NaturalKey, Record};
use crate::{log_op_end, log_op_error, log_op_start};

/// Index one snapshot by natural key.
///
/// # Errors
///
/// - `AmbiguousKey`: two records of the snapshot derive the same key
fn index_snapshot<I, K>(
    records: I,
    key_of: &K,
    which: &str,
) -> Result<BTreeMap<NaturalKey, Record>, ExError>
where
    I: IntoIterator<Item = Record>,
    K: KeyOf + ?Sized,
{
    let mut index = BTreeMap::new();
    for record in records {
        let key = key_of.key_of(&record);
        if index.contains_key(&key) {
            return Err(ReconError::AmbiguousKey {
                natural_key: key.to_string(),
                snapshot: which.to_string(),
            }
            .into());
        }
        index.insert(key, record);
    }
    Ok(index)
}

/// Compute the minimal change set comparing every payload field.
///
/// See [`compute_changes_with`].
///
/// # Errors
///
/// - `AmbiguousKey`: a natural key repeats within either snapshot
pub fn compute_changes<B, C, K>(baseline: B, current: C, key_of: &K) -> Result<ChangeSet, ExError>
where
    B: IntoIterator<Item = Record>,
    C: IntoIterator<Item = Record>,
    K: KeyOf + ?Sized,
{
    compute_changes_with(baseline, current, key_of, &DiffOptions::default())
}

/// Compute the minimal change set between `baseline` and `current`.
///
/// - key only in `current` → CREATE with the current payload
/// - key only in `baseline` → DELETE with `key_of.identity_of(baseline)`
/// - key in both with a payload difference on the compared fields → UPDATE
///   with the current payload
/// - otherwise nothing
///
/// Entries are returned in natural-key order.
///
/// # Errors
///
/// - `AmbiguousKey`: a natural key repeats within either snapshot
pub fn compute_changes_with<B, C, K>(
    baseline: B,
    current: C,
    key_of: &K,
    options: &DiffOptions,
) -> Result<ChangeSet, ExError>
where
    B: IntoIterator<Item = Record>,
    C: IntoIterator<Item = Record>,
    K: KeyOf + ?Sized,
{
    let started = Instant::now();
    log_op_start!("diff");

    let indexed = index_snapshot(baseline, key_of, "baseline").and_then(|old| {
        index_snapshot(current, key_of, "current").map(|new| (old, new))
    });
    let (old, new) = match indexed {
        Ok(pair) => pair,
        Err(err) => {
            log_op_error!(
                "diff",
                err.clone(),
                duration_ms = started.elapsed().as_millis() as u64
            );
            return Err(err);
        }
    };

    let baseline_len = old.len();
    let current_len = new.len();
    let changes = merge_walk(old, new, key_of, &options.compare_fields);

    log_op_end!(
        "diff",
        duration_ms = started.elapsed().as_millis() as u64,
        baseline_len = baseline_len,
        current_len = current_len,
        created = changes.stats.created,
        updated = changes.stats.updated,
        deleted = changes.stats.deleted,
        unchanged = changes.stats.unchanged
    );
    Ok(changes)
}

/// Walk both key-ordered indexes in lockstep and classify every key.
fn merge_walk<K>(
    old: BTreeMap<NaturalKey, Record>,
    new: BTreeMap<NaturalKey, Record>,
    key_of: &K,
    compare_fields: &[String],
) -> ChangeSet
where
    K: KeyOf + ?Sized,
{
    let mut entries = Vec::with_capacity(old.len().max(new.len()));
    let mut stats = DiffStats::default();

    let mut old_iter: Peekable<_> = old.into_iter().peekable();
    let mut new_iter: Peekable<_> = new.into_iter().peekable();

    loop {
        let order = match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((old_key, _)), Some((new_key, _))) => old_key.cmp(new_key),
        };

        match order {
            Ordering::Less => {
                if let Some((key, record)) = old_iter.next() {
                    stats.deleted += 1;
                    entries.push(ChangeEntry::delete(key, key_of.identity_of(&record)));
                }
            }
            Ordering::Greater => {
                if let Some((key, record)) = new_iter.next() {
                    stats.created += 1;
                    entries.push(ChangeEntry::create(key, record));
                }
            }
            Ordering::Equal => {
                if let (Some((_, old_record)), Some((key, new_record))) =
                    (old_iter.next(), new_iter.next())
                {
                    if old_record.same_payload(&new_record, compare_fields) {
                        stats.unchanged += 1;
                    } else {
                        stats.updated += 1;
                        entries.push(ChangeEntry::update(key, new_record));
                    }
                }
            }
        }
    }

    ChangeSet { entries, stats }
}
