use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use idsync_core::{ChangeEntry, HandleOutcome, KeySpec, Record, RecordHandler, RunConfig};

/// A user record with an optional manager reference
#[allow(dead_code)]
pub fn user(id: &str, mgr: &str) -> Record {
    Record::new().with("id", id).with("mgr", mgr)
}

/// Single-field key on `id`, small windows
#[allow(dead_code)]
pub fn config() -> RunConfig {
    RunConfig::new(KeySpec::new(["id"])).with_bulk_size(2)
}

/// Handler modelling a downstream repository with manager references.
///
/// A record whose `mgr` names a key that was neither seeded nor applied is
/// reported missing-owner. Keys listed in `fail` are rejected outright.
/// Every call is recorded in order.
#[allow(dead_code)]
#[derive(Default)]
pub struct DirectoryHandler {
    pub present: HashSet<String>,
    pub fail: HashSet<String>,
    pub calls: Rc<RefCell<Vec<String>>>,
    pub applied: HashMap<String, u32>,
}

#[allow(dead_code)]
impl DirectoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(keys: &[&str]) -> Self {
        Self {
            present: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing(mut self, key: &str) -> Self {
        self.fail.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl RecordHandler for DirectoryHandler {
    fn handle(&mut self, entry: &ChangeEntry) -> HandleOutcome {
        let key = entry.natural_key.to_string();
        self.calls.borrow_mut().push(key.clone());

        if self.fail.contains(&key) {
            return HandleOutcome::hard_failure("rejected by directory");
        }
        let mgr = entry
            .payload
            .get("mgr")
            .map(|v| v.as_key_component())
            .unwrap_or_default();
        if !mgr.is_empty() && !self.present.contains(&mgr) {
            return HandleOutcome::missing_owner(mgr);
        }
        self.present.insert(key.clone());
        *self.applied.entry(key).or_default() += 1;
        HandleOutcome::Success
    }
}
