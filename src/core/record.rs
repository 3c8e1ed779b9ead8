//! Records and search results returned by a data source.
//!
//! A record is an identifier plus a sparse, insertion-ordered map of field
//! values. Field values are kept as JSON so strings, numbers, booleans,
//! lists, and nested objects all survive unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record from a table.
///
/// # Examples
///
/// ```
/// use marksplice::core::Record;
/// use serde_json::json;
///
/// let record = Record::new("rec8f2kD93nQ")
///     .with_field("Name", json!("Quan, Luis"))
///     .with_field("Sessions", json!(3));
/// assert_eq!(record.fields.get("Sessions"), Some(&json!(3)));
/// assert_eq!(record.display_id(8), "rec8f2kD...");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable source identifier.
    pub id: String,

    /// Field values in the record's own order.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with no fields.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Creates a record from an identifier and an existing field map.
    #[must_use]
    pub const fn with_fields(id: String, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }

    /// Appends a field, keeping insertion order.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Field values serialized as one JSON object string.
    ///
    /// Term matching runs over this text.
    #[must_use]
    pub fn fields_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    /// Identifier shortened to `max_chars` characters for display.
    ///
    /// An ellipsis marks truncation; short identifiers are shown whole.
    #[must_use]
    pub fn display_id(&self, max_chars: usize) -> String {
        match self.id.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.id[..cut]),
            None => self.id.clone(),
        }
    }
}

/// Outcome of a browse or filter call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Number of records returned.
    pub count: usize,

    /// The records, in source order.
    pub records: Vec<Record>,
}

impl SearchResult {
    /// Builds a result whose count matches the record list.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }

    /// Returns true if no records were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_is_insertion_order() {
        let record = Record::new("rec1")
            .with_field("Zeta", json!(1))
            .with_field("Alpha", json!(2))
            .with_field("Mid", json!(3));
        let keys: Vec<&str> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_display_id() {
        let record = Record::new("recABCDEFGHIJ");
        assert_eq!(record.display_id(8), "recABCDE...");
        assert_eq!(Record::new("rec1").display_id(8), "rec1");
        assert_eq!(Record::new("12345678").display_id(8), "12345678");
    }

    #[test]
    fn test_fields_json() {
        let record = Record::new("r").with_field("Name", json!("Luis Quan"));
        assert_eq!(record.fields_json(), r#"{"Name":"Luis Quan"}"#);
    }

    #[test]
    fn test_search_result_count_matches_records() {
        let result = SearchResult::from_records(vec![Record::new("a"), Record::new("b")]);
        assert_eq!(result.count, 2);
        assert!(!result.is_empty());
        assert!(SearchResult::from_records(Vec::new()).is_empty());
    }

    #[test]
    fn test_record_deserializes_without_fields() {
        let record: Record = serde_json::from_str(r#"{"id":"rec9"}"#).unwrap();
        assert_eq!(record.id, "rec9");
        assert!(record.fields.is_empty());
    }
}
