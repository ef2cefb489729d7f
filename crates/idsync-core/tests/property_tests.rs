//! Property tests for the differ, the windowed reader and the resolver.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, BTreeSet};

use idsync_core::resolver::{DependencyResolver, EdgeState};
use idsync_core::{
    compute_changes, ChangeEntry, ChangeKind, KeySpec, NaturalKey, Record, VecSource,
    WindowedReader,
};
use proptest::prelude::*;

/// Snapshot with unique ids drawn from a small alphabet so that baselines
/// and currents overlap.
fn snapshot() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_map("[a-h]{1,2}", prop::option::of("[xyz]"), 0..12).prop_map(
        |rows: BTreeMap<String, Option<String>>| {
            rows.into_iter()
                .map(|(id, cn)| Record::new().with("id", id).with("cn", cn))
                .collect()
        },
    )
}

fn ids(records: &[Record]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|r| r.get("id").map(|v| v.as_key_component()))
        .collect()
}

proptest! {
    #[test]
    fn prop_diff_of_snapshot_with_itself_is_empty(s in snapshot()) {
        let changes = compute_changes(s.clone(), s.clone(), &KeySpec::new(["id"])).unwrap();
        prop_assert!(changes.entries.is_empty());
        prop_assert_eq!(changes.stats.unchanged, s.len());
    }

    #[test]
    fn prop_diff_accounts_for_every_key_once(a in snapshot(), b in snapshot()) {
        let changes = compute_changes(a.clone(), b.clone(), &KeySpec::new(["id"])).unwrap();

        let emitted: Vec<&str> = changes.entries.iter().map(|e| e.natural_key.as_str()).collect();
        let unique: BTreeSet<&str> = emitted.iter().copied().collect();
        prop_assert_eq!(unique.len(), emitted.len());

        let (old, new) = (ids(&a), ids(&b));
        for entry in &changes.entries {
            let key = entry.natural_key.to_string();
            match entry.kind {
                ChangeKind::Create => prop_assert!(!old.contains(&key) && new.contains(&key)),
                ChangeKind::Delete => prop_assert!(old.contains(&key) && !new.contains(&key)),
                ChangeKind::Update => prop_assert!(old.contains(&key) && new.contains(&key)),
            }
        }
        let expected_create_delete = old.symmetric_difference(&new).count();
        prop_assert_eq!(
            changes.stats.created + changes.stats.deleted,
            expected_create_delete
        );
        prop_assert_eq!(
            changes.stats.updated + changes.stats.unchanged,
            old.intersection(&new).count()
        );
    }

    #[test]
    fn prop_diff_is_deterministic_under_reordering(a in snapshot(), b in snapshot()) {
        let spec = KeySpec::new(["id"]);
        let forward = compute_changes(a.clone(), b.clone(), &spec).unwrap();
        let reversed = compute_changes(
            a.into_iter().rev(),
            b.into_iter().rev(),
            &spec,
        )
        .unwrap();
        prop_assert_eq!(forward, reversed);
    }

    #[test]
    fn prop_windows_reproduce_source(len in 0usize..40, size in 0usize..10) {
        let entries: Vec<ChangeEntry> = (0..len)
            .map(|i| ChangeEntry::create(format!("k{:03}", i), Record::new()))
            .collect();
        let mut reader = WindowedReader::new(VecSource::new(entries.clone()));

        let mut seen = Vec::new();
        while !reader.exhausted() {
            let window = reader.next_window(size).unwrap();
            prop_assert!(window.len() <= size.max(1));
            seen.extend(window);
        }
        prop_assert_eq!(seen, entries);
        prop_assert!(reader.next_window(size).unwrap().is_empty());
    }

    #[test]
    fn prop_resolver_empties_within_max_attempts(
        edges in prop::collection::btree_map("[a-j]", "[k-o]", 0..10),
        max_attempts in 1u32..5,
    ) {
        let mut resolver = DependencyResolver::new();
        for (dependent, owner) in &edges {
            let key = NaturalKey::from(dependent.as_str());
            resolver.defer(
                key.clone(),
                NaturalKey::from(owner.as_str()),
                ChangeEntry::update(key, Record::new()),
            );
        }

        // No owner is ever promoted: every edge must be demoted in time.
        for _ in 0..max_attempts {
            resolver.age_and_demote(max_attempts);
        }
        prop_assert!(!resolver.has_pending());
        prop_assert_eq!(resolver.drain_unresolved().len(), edges.len());
    }

    #[test]
    fn prop_resolver_states_only_move_forward(
        edges in prop::collection::btree_map("[a-j]", "[k-o]", 1..10),
        promoted in prop::collection::btree_set("[k-o]", 0..5),
        rounds in 1u32..4,
    ) {
        let mut resolver = DependencyResolver::new();
        for (dependent, owner) in &edges {
            let key = NaturalKey::from(dependent.as_str());
            resolver.defer(
                key.clone(),
                NaturalKey::from(owner.as_str()),
                ChangeEntry::update(key, Record::new()),
            );
        }

        let rank = |state: Option<EdgeState>| match state {
            Some(EdgeState::Pending) => 0,
            Some(EdgeState::Resolved) => 1,
            Some(EdgeState::Unresolved) => 2,
            None => 3,
        };
        let keys: Vec<NaturalKey> = edges.keys().map(|k| NaturalKey::from(k.as_str())).collect();
        let mut last: Vec<u8> = keys.iter().map(|k| rank(resolver.state_of(k))).collect();

        for owner in &promoted {
            resolver.promote(&NaturalKey::from(owner.as_str()));
        }
        for _ in 0..rounds {
            resolver.age_and_demote(3);
            let now: Vec<u8> = keys.iter().map(|k| rank(resolver.state_of(k))).collect();
            for (before, after) in last.iter().zip(&now) {
                prop_assert!(after >= before);
            }
            last = now;
        }

        for key in &keys {
            if resolver.state_of(key) == Some(EdgeState::Resolved) {
                let owner = &edges[key.as_str()];
                prop_assert!(promoted.contains(owner));
            }
        }
    }
}
