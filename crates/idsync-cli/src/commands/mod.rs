pub mod diff;
pub mod reconcile;
