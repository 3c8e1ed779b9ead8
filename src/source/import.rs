//! Parsing of record files for import.
//!
//! Accepts a JSON array whose elements are either `{"id": ..., "fields": {...}}`
//! objects (the shape records are exported in) or flat field objects.

use crate::error::{SourceError, SourceResult};
use serde_json::{Map, Value};

/// A record waiting to be stored. Records without an identifier get one
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Identifier supplied by the file, if any.
    pub id: Option<String>,
    /// Field values in file order.
    pub fields: Map<String, Value>,
}

impl NewRecord {
    /// Creates a record with the given fields and no identifier.
    #[must_use]
    pub const fn from_fields(fields: Map<String, Value>) -> Self {
        Self { id: None, fields }
    }
}

/// Parses an import file.
///
/// # Errors
///
/// Returns [`SourceError::Serialization`] if the text is not JSON, is not an
/// array, or contains a non-object element.
///
/// # Examples
///
/// ```
/// use marksplice::source::parse_records;
///
/// let records = parse_records(r#"[
///     {"id": "recA1", "fields": {"Name": "Verma"}},
///     {"Name": "Bastien", "Sessions": 2}
/// ]"#).unwrap();
/// assert_eq!(records[0].id.as_deref(), Some("recA1"));
/// assert!(records[1].id.is_none());
/// ```
pub fn parse_records(text: &str) -> SourceResult<Vec<NewRecord>> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(items) = value else {
        return Err(SourceError::Serialization(
            "expected a JSON array of records".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(object) => Ok(from_object(object)),
            other => Err(SourceError::Serialization(format!(
                "record {index} is not an object: {other}"
            ))),
        })
        .collect()
}

fn from_object(mut object: Map<String, Value>) -> NewRecord {
    let wrapped = matches!(object.get("fields"), Some(Value::Object(_)));
    if !wrapped {
        return NewRecord::from_fields(object);
    }

    let id = match object.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        _ => None,
    };
    let fields = match object.remove("fields") {
        Some(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    NewRecord { id, fields }
}
