//! Markdown rendering of resolved data.
//!
//! Output is wrapped in blank lines so it renders as its own block in the
//! middle of streamed prose. Rendered data never contains `{{`, so resolved
//! text cannot be resolved again.

use crate::config::DEFAULT_ID_DISPLAY_LEN;
use crate::core::Record;
use crate::marker::OPEN;
use serde_json::Value;
use std::fmt::Write;

/// Notice used in place of an empty record list.
pub const NO_RECORDS: &str = "_No records found._";

/// Separator between record blocks.
const RECORD_SEPARATOR: &str = "\n\n---\n\n";

/// Renders table names as a numbered list.
///
/// # Examples
///
/// ```
/// use marksplice::format::format_table_list;
///
/// let text = format_table_list(&["A".to_string(), "B".to_string()]);
/// assert_eq!(text, "\n\n1. **A**\n2. **B**\n\n");
/// ```
#[must_use]
pub fn format_table_list(names: &[String]) -> String {
    let mut output = String::from("\n\n");
    for (index, name) in names.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let _ = write!(output, "{}. **{name}**", index + 1);
    }
    output.push_str("\n\n");
    defuse_markers(output)
}

/// Renders records as labeled blocks, one `**field:** value` line per
/// non-empty field, separated by horizontal rules.
#[must_use]
pub fn format_records(records: &[Record]) -> String {
    if records.is_empty() {
        return NO_RECORDS.to_string();
    }

    let blocks: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(index, record)| format_record(index, record))
        .collect();

    defuse_markers(format!("\n\n{}\n\n", blocks.join(RECORD_SEPARATOR)))
}

/// Breaks every `{{` in rendered data with a zero-width space.
fn defuse_markers(text: String) -> String {
    if !text.contains(OPEN) {
        return text;
    }
    let mut output = String::with_capacity(text.len() + 8);
    let mut after_brace = false;
    for c in text.chars() {
        if c == '{' && after_brace {
            output.push('\u{200B}');
        }
        output.push(c);
        after_brace = c == '{';
    }
    output
}

fn format_record(index: usize, record: &Record) -> String {
    let mut block = String::new();
    let _ = write!(
        block,
        "**Record {}** (ID: {})",
        index + 1,
        record.display_id(DEFAULT_ID_DISPLAY_LEN)
    );
    for (name, value) in &record.fields {
        if let Some(text) = display_value(value) {
            let _ = write!(block, "\n   **{name}:** {text}");
        }
    }
    block
}

/// Display text for a field value, or `None` if the field should be omitted.
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(
            items
                .iter()
                .map(list_item)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(scalar(other)),
    }
}

fn list_item(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => scalar(other),
    }
}

/// Strings print bare; everything else prints as JSON.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
