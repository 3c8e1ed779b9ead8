//! Segment scanning and partial-marker detection.

use super::{CLOSE, Marker, OPEN};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// One piece of a scanned segment, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Text passed through unchanged.
    Literal(&'a str),
    /// A complete, recognized marker.
    Marker {
        /// The parsed directive.
        marker: Marker,
        /// The exact source text of the marker, braces included.
        raw: &'a str,
    },
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    // Fields stop at ':' and never contain braces, so a marker cannot swallow
    // the opening of a later one.
    MARKER.get_or_init(|| {
        Regex::new(concat!(
            r"\{\{(?:",
            r"(?P<tables>TABLES)",
            r"|SEARCH:(?P<s_table>[^:{}]+):(?P<s_limit>\d+)",
            r"|QUERY:(?P<q_table>[^:{}]+):(?P<q_term>[^:{}]+):(?P<q_limit>\d+)",
            r"|COUNT:(?P<c_table>[^:{}]+)",
            r")\}\}",
        ))
        .expect("valid regex")
    })
}

fn field<'a>(caps: &Captures<'a>, name: &str) -> Option<&'a str> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

fn limit(caps: &Captures<'_>, name: &str) -> Option<usize> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn marker_from(caps: &Captures<'_>) -> Option<Marker> {
    if caps.name("tables").is_some() {
        return Some(Marker::ListTables);
    }
    if let Some(table) = field(caps, "s_table") {
        return Some(Marker::Search {
            table: table.to_string(),
            limit: limit(caps, "s_limit")?,
        });
    }
    if caps.name("q_table").is_some() {
        return Some(Marker::Query {
            table: field(caps, "q_table")?.to_string(),
            term: field(caps, "q_term")?.to_string(),
            limit: limit(caps, "q_limit")?,
        });
    }
    field(caps, "c_table").map(|table| Marker::Count {
        table: table.to_string(),
    })
}

/// Splits a segment into literal text and complete markers, left to right.
///
/// Malformed directives (blank table, oversized limit) stay literal.
/// Concatenating the `Literal` texts and marker `raw` texts reproduces the
/// input exactly.
///
/// # Examples
///
/// ```
/// use marksplice::marker::{Marker, Token, scan};
///
/// let tokens = scan("We have {{COUNT:IG Lives}} lives.");
/// assert_eq!(tokens.len(), 3);
/// assert_eq!(tokens[0], Token::Literal("We have "));
/// ```
#[must_use]
pub fn scan(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in marker_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(marker) = marker_from(&caps) else {
            continue;
        };
        if whole.start() > cursor {
            tokens.push(Token::Literal(&text[cursor..whole.start()]));
        }
        tokens.push(Token::Marker {
            marker,
            raw: whole.as_str(),
        });
        cursor = whole.end();
    }

    if cursor < text.len() {
        tokens.push(Token::Literal(&text[cursor..]));
    }
    tokens
}

/// Byte offset of an unmatched `{{`, if the text ends inside an open marker.
///
/// A marker is open when the last `{{` comes after the last `}}` (or no
/// `}}` has been seen).
#[must_use]
pub fn open_marker_start(text: &str) -> Option<usize> {
    let open = text.rfind(OPEN)?;
    match text.rfind(CLOSE) {
        Some(close) if close > open => None,
        _ => Some(open),
    }
}

/// Length of the prefix of `text` that can be processed without waiting for
/// more input.
///
/// Everything from an open marker onward is held back, as is a single
/// trailing `{` that may turn out to be the first half of `{{`.
#[must_use]
pub fn hold_point(text: &str) -> usize {
    if let Some(open) = open_marker_start(text) {
        return open;
    }
    if text.ends_with('{') {
        text.len() - 1
    } else {
        text.len()
    }
}
