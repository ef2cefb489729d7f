//! Forward-reference dependency resolution.
//!
//! When a record cannot be applied because the entity it references (its
//! *owner*, e.g. a manager or parent organization) is not in the repository
//! yet, the controller defers it here. Every edge lives in exactly one of
//! three sets:
//!
//! - `pending`: waiting for its owner
//! - `resolved`: owner was applied during this run, ready for resubmission
//! - `unresolved`: retry budget spent, or the run ended first. Terminal.
//!
//! This is a two-phase forward-reference scheme rather than a topological
//! sort: a chain of depth `d` needs up to `d` passes, and `max_attempts`
//! bounds the number of passes even for cyclic or unsatisfiable references.
//!
//! [`DependencyResolver::defer`] takes `&self` and only touches a
//! mutex-guarded inbox, so handlers running in parallel may defer
//! concurrently. Every other operation takes `&mut self` and first folds the
//! inbox into the three sets.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::model::{ChangeEntry, NaturalKey};

/// A deferred record and the owner it waits for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependent_key: NaturalKey,
    pub owner_key: NaturalKey,
    pub payload: ChangeEntry,
    /// Passes this dependent survived without its owner appearing
    pub attempt_count: u32,
    #[serde(skip)]
    seq: u64,
}

/// Where a dependent currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    Pending,
    Resolved,
    Unresolved,
}

/// Counts of the three edge sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub pending: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Outcome of one [`DependencyResolver::age_and_demote`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgeReport {
    /// Pending edges whose attempt count was incremented
    pub aged: usize,
    /// Edges moved to `unresolved`
    pub demoted: usize,
}

#[derive(Debug)]
struct Deferral {
    dependent_key: NaturalKey,
    owner_key: NaturalKey,
    payload: ChangeEntry,
}

/// Bookkeeping of deferred records for a single run
#[derive(Debug, Default)]
pub struct DependencyResolver {
    inbox: Mutex<Vec<Deferral>>,
    /// Pending edges grouped by the owner they wait for
    pending: HashMap<NaturalKey, Vec<DependencyEdge>>,
    resolved: Vec<DependencyEdge>,
    unresolved: Vec<DependencyEdge>,
    /// Current set of every dependent held by the resolver
    located: HashMap<NaturalKey, EdgeState>,
    /// Owners promoted during this run
    satisfied: HashSet<NaturalKey>,
    /// Attempt counts survive resubmission; they are never reset
    attempts: HashMap<NaturalKey, u32>,
    /// Dependents handed out since the last `age_and_demote`
    offered: HashSet<NaturalKey>,
    next_seq: u64,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `payload` until `owner_key` has been applied in this run.
    ///
    /// Safe to call from several threads at once. The deferral is folded
    /// into the edge sets by the next `&mut self` operation.
    pub fn defer(&self, dependent_key: NaturalKey, owner_key: NaturalKey, payload: ChangeEntry) {
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Deferral {
                dependent_key,
                owner_key,
                payload,
            });
    }

    /// Mark `owner_key` as applied and move its pending dependents to
    /// `resolved`. Returns the number of edges moved.
    ///
    /// Promoting an owner nobody waits for only records it as satisfied, so
    /// a later deferral against it resolves immediately.
    pub fn promote(&mut self, owner_key: &NaturalKey) -> usize {
        self.settle();
        self.satisfied.insert(owner_key.clone());

        let Some(mut edges) = self.pending.remove(owner_key) else {
            return 0;
        };
        edges.sort_by_key(|e| e.seq);
        let moved = edges.len();
        for edge in edges {
            self.located
                .insert(edge.dependent_key.clone(), EdgeState::Resolved);
            self.resolved.push(edge);
        }
        moved
    }

    /// Hand out resolved edges for resubmission, in promotion order.
    ///
    /// Edges already handed out since the last `age_and_demote` stay in
    /// `resolved` until the next pass.
    pub fn drain_resolved(&mut self) -> Vec<ChangeEntry> {
        self.settle();
        let (offer, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.resolved)
            .into_iter()
            .partition(|e| !self.offered.contains(&e.dependent_key));
        self.resolved = keep;
        self.hand_out(offer)
    }

    /// Hand out pending edges for a retry against the repository, in
    /// deferral order. Their attempt counts are kept for the next deferral.
    pub fn drain_pending(&mut self) -> Vec<ChangeEntry> {
        self.settle();
        let mut offer = Vec::new();
        let mut keep: HashMap<NaturalKey, Vec<DependencyEdge>> = HashMap::new();
        for (owner, edges) in std::mem::take(&mut self.pending) {
            for edge in edges {
                if self.offered.contains(&edge.dependent_key) {
                    keep.entry(owner.clone()).or_default().push(edge);
                } else {
                    offer.push(edge);
                }
            }
        }
        self.pending = keep;
        offer.sort_by_key(|e| e.seq);
        self.hand_out(offer)
    }

    /// End-of-pass aging.
    ///
    /// Every pending edge gets `attempt_count += 1`; edges reaching
    /// `max_attempts` move to `unresolved`. Also opens a new pass for the
    /// re-offer guard.
    pub fn age_and_demote(&mut self, max_attempts: u32) -> AgeReport {
        self.settle();
        let mut report = AgeReport::default();
        let mut demoted = Vec::new();

        for edges in self.pending.values_mut() {
            let mut index = 0;
            while index < edges.len() {
                let edge = &mut edges[index];
                edge.attempt_count += 1;
                self.attempts
                    .insert(edge.dependent_key.clone(), edge.attempt_count);
                report.aged += 1;
                if edge.attempt_count >= max_attempts {
                    demoted.push(edges.remove(index));
                } else {
                    index += 1;
                }
            }
        }
        self.pending.retain(|_, edges| !edges.is_empty());

        demoted.sort_by_key(|e| e.seq);
        report.demoted = demoted.len();
        for edge in demoted {
            self.demote(edge);
        }

        self.offered.clear();
        report
    }

    /// Move every outstanding edge, pending or resolved, to `unresolved`.
    ///
    /// Used when the run ends before the edges could be retried.
    pub fn abandon_remaining(&mut self) -> usize {
        self.settle();
        let mut remaining: Vec<DependencyEdge> = std::mem::take(&mut self.pending)
            .into_values()
            .flatten()
            .collect();
        remaining.sort_by_key(|e| e.seq);
        remaining.append(&mut self.resolved);

        let count = remaining.len();
        for edge in remaining {
            self.demote(edge);
        }
        count
    }

    /// Take the residual edges for the error sink.
    ///
    /// Their dependents stay known as unresolved for the rest of the run.
    pub fn drain_unresolved(&mut self) -> Vec<DependencyEdge> {
        self.settle();
        std::mem::take(&mut self.unresolved)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.inbox_has(|r, d| !r.satisfied.contains(&d.owner_key))
    }

    pub fn has_resolved(&self) -> bool {
        !self.resolved.is_empty() || self.inbox_has(|r, d| r.satisfied.contains(&d.owner_key))
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Current set of a dependent, `None` if the resolver does not hold it
    pub fn state_of(&mut self, dependent_key: &NaturalKey) -> Option<EdgeState> {
        self.settle();
        self.located.get(dependent_key).copied()
    }

    /// Attempt count recorded for a dependent
    pub fn attempts_of(&self, dependent_key: &NaturalKey) -> u32 {
        self.attempts.get(dependent_key).copied().unwrap_or(0)
    }

    pub fn is_satisfied(&self, owner_key: &NaturalKey) -> bool {
        self.satisfied.contains(owner_key)
    }

    pub fn stats(&mut self) -> ResolverStats {
        self.settle();
        ResolverStats {
            pending: self.pending.values().map(Vec::len).sum(),
            resolved: self.resolved.len(),
            unresolved: self.unresolved.len(),
        }
    }

    /// Fold deferrals from the inbox into the edge sets.
    fn settle(&mut self) {
        let deferrals = std::mem::take(
            &mut *self
                .inbox
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for deferral in deferrals {
            self.insert(deferral);
        }
    }

    fn insert(&mut self, deferral: Deferral) {
        if let Some(state) = self.located.get(&deferral.dependent_key) {
            tracing::debug!(
                natural_key = %deferral.dependent_key,
                state = ?state,
                "deferral ignored, dependent already held"
            );
            return;
        }

        let edge = DependencyEdge {
            attempt_count: self.attempts_of(&deferral.dependent_key),
            dependent_key: deferral.dependent_key,
            owner_key: deferral.owner_key,
            payload: deferral.payload,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        // Owner applied earlier in this run: optimistic retry next pass.
        if self.satisfied.contains(&edge.owner_key) {
            self.located
                .insert(edge.dependent_key.clone(), EdgeState::Resolved);
            self.resolved.push(edge);
        } else {
            self.located
                .insert(edge.dependent_key.clone(), EdgeState::Pending);
            self.pending
                .entry(edge.owner_key.clone())
                .or_default()
                .push(edge);
        }
    }

    fn demote(&mut self, edge: DependencyEdge) {
        self.located
            .insert(edge.dependent_key.clone(), EdgeState::Unresolved);
        self.unresolved.push(edge);
    }

    fn hand_out(&mut self, edges: Vec<DependencyEdge>) -> Vec<ChangeEntry> {
        edges
            .into_iter()
            .map(|edge| {
                self.located.remove(&edge.dependent_key);
                self.offered.insert(edge.dependent_key);
                edge.payload
            })
            .collect()
    }

    fn inbox_has<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Self, &Deferral) -> bool,
    {
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|d| !self.located.contains_key(&d.dependent_key) && predicate(self, d))
    }
}
