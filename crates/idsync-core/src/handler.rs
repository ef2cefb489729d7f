//! Per-record handler interface.
//!
//! The handler is the seam to the downstream identity repository. It is the
//! only authority on whether an owner entity exists there; the engine just
//! acts on the outcome it reports.

use crate::model::{ChangeEntry, NaturalKey};

/// Result of applying one change entry downstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The change was applied
    Success,
    /// Nothing to do downstream (e.g. the value already exists)
    Ignored,
    /// The referenced owner does not exist yet; retry once it does
    MissingOwner(NaturalKey),
    /// Rejected for a reason unrelated to ordering; not retried
    HardFailure(String),
}

impl HandleOutcome {
    pub fn missing_owner(owner: impl Into<NaturalKey>) -> Self {
        HandleOutcome::MissingOwner(owner.into())
    }

    pub fn hard_failure(reason: impl Into<String>) -> Self {
        HandleOutcome::HardFailure(reason.into())
    }
}

/// Applies change entries to the downstream repository
pub trait RecordHandler {
    fn handle(&mut self, entry: &ChangeEntry) -> HandleOutcome;
}

impl<F> RecordHandler for F
where
    F: FnMut(&ChangeEntry) -> HandleOutcome,
{
    fn handle(&mut self, entry: &ChangeEntry) -> HandleOutcome {
        self(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    #[test]
    fn test_closure_handler() {
        let mut calls = 0;
        let mut handler = |entry: &ChangeEntry| {
            calls += 1;
            if entry.natural_key.as_str() == "u2" {
                HandleOutcome::missing_owner("u1")
            } else {
                HandleOutcome::Success
            }
        };
        let u1 = ChangeEntry::create("u1", Record::new());
        let u2 = ChangeEntry::create("u2", Record::new());
        assert_eq!(handler.handle(&u1), HandleOutcome::Success);
        assert_eq!(
            handler.handle(&u2),
            HandleOutcome::MissingOwner(NaturalKey::from("u1"))
        );
        drop(handler);
        assert_eq!(calls, 2);
    }
}
