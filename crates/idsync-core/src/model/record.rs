use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single attribute value of an identity record
///
/// Extracts only carry text, integers and empty cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// Render the value as a natural-key component.
    ///
    /// Nulls contribute an empty component.
    pub fn as_key_component(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// Text view of the value, `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// One identity entity: field name to value, ordered by field name
///
/// Serializes as a flat JSON object so snapshot lines stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create a new empty record
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a value by field name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Set a value by field name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a value by field name
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Check if a field exists
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Field names in name order
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field-by-field equality restricted to `fields`.
    ///
    /// An empty `fields` slice compares every field of both records. A field
    /// absent on one side equals an explicit null on the other.
    pub fn same_payload(&self, other: &Record, fields: &[String]) -> bool {
        if fields.is_empty() {
            return self
                .fields
                .keys()
                .chain(other.fields.keys())
                .all(|name| self.value_or_null(name) == other.value_or_null(name));
        }
        fields
            .iter()
            .all(|name| self.value_or_null(name) == other.value_or_null(name))
    }

    fn value_or_null(&self, name: &str) -> &FieldValue {
        static NULL: FieldValue = FieldValue::Null;
        self.fields.get(name).unwrap_or(&NULL)
    }
}

impl From<BTreeMap<String, FieldValue>> for Record {
    fn from(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }
}

impl From<Record> for BTreeMap<String, FieldValue> {
    fn from(record: Record) -> Self {
        record.fields
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_as_flat_object() {
        let record = Record::new()
            .with("id", "u1")
            .with("level", 3)
            .with("mgr", FieldValue::Null);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":"u1","level":3,"mgr":null}"#);

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_same_payload_treats_missing_as_null() {
        let a = Record::new().with("id", "u1").with("mgr", FieldValue::Null);
        let b = Record::new().with("id", "u1");
        assert!(a.same_payload(&b, &[]));
    }

    #[test]
    fn test_same_payload_detects_changed_field() {
        let a = Record::new().with("id", "u1").with("mail", "a@x");
        let b = Record::new().with("id", "u1").with("mail", "b@x");
        assert!(!a.same_payload(&b, &[]));
    }

    #[test]
    fn test_same_payload_respects_compare_fields() {
        let a = Record::new().with("id", "u1").with("mail", "a@x").with("cn", "A");
        let b = Record::new().with("id", "u1").with("mail", "b@x").with("cn", "A");
        assert!(a.same_payload(&b, &["cn".to_string()]));
        assert!(!a.same_payload(&b, &["mail".to_string()]));
    }

    #[test]
    fn test_key_component_rendering() {
        assert_eq!(FieldValue::Null.as_key_component(), "");
        assert_eq!(FieldValue::Integer(42).as_key_component(), "42");
        assert_eq!(FieldValue::from("abc").as_key_component(), "abc");
    }
}
