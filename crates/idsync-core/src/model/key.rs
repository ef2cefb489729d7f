//! Natural keys and how they are derived from records.

use serde::{Deserialize, Serialize};

use crate::model::record::Record;

/// Stable identity of a record across snapshots
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the key is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// A usable key is non-blank and fits on one line of a change file.
    pub fn is_well_formed(&self) -> bool {
        !self.is_blank() && !self.0.chars().any(char::is_control)
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NaturalKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NaturalKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Derives natural keys from records
///
/// Implemented by [`KeySpec`] and by any `Fn(&Record) -> NaturalKey`.
pub trait KeyOf {
    fn key_of(&self, record: &Record) -> NaturalKey;

    /// Minimal payload identifying `record`, used for DELETE entries.
    fn identity_of(&self, record: &Record) -> Record {
        record.clone()
    }
}

impl<F> KeyOf for F
where
    F: Fn(&Record) -> NaturalKey,
{
    fn key_of(&self, record: &Record) -> NaturalKey {
        self(record)
    }
}

fn default_separator() -> String {
    "|".to_string()
}

/// Ordered list of identifier fields plus the separator joining them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub fields: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl KeySpec {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: default_separator(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl KeyOf for KeySpec {
    /// Concatenate the identifier components.
    ///
    /// When every component is empty the key is empty, so that it reports
    /// blank rather than a string of bare separators.
    fn key_of(&self, record: &Record) -> NaturalKey {
        let components: Vec<String> = self
            .fields
            .iter()
            .map(|name| {
                record
                    .get(name)
                    .map(|v| v.as_key_component())
                    .unwrap_or_default()
            })
            .collect();
        if components.iter().all(|c| c.is_empty()) {
            return NaturalKey(String::new());
        }
        NaturalKey(components.join(&self.separator))
    }

    fn identity_of(&self, record: &Record) -> Record {
        self.fields
            .iter()
            .filter_map(|name| record.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}
