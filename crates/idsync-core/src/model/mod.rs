pub mod change;
pub mod key;
pub mod record;

pub use change::{ChangeEntry, ChangeKind};
pub use key::{KeyOf, KeySpec, NaturalKey};
pub use record::{FieldValue, Record};
