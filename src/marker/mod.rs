//! Marker grammar.
//!
//! Markers are short directives embedded in model output, delimited by
//! double braces:
//!
//! - `{{TABLES}}`
//! - `{{SEARCH:<table>:<limit>}}`
//! - `{{QUERY:<table>:<term>:<limit>}}`
//! - `{{COUNT:<table>}}`
//!
//! Anything else between braces is ordinary text.

mod scan;

pub use scan::{Token, hold_point, open_marker_start, scan};

use serde::Serialize;
use std::fmt;

/// Opening delimiter of a marker.
pub const OPEN: &str = "{{";

/// Closing delimiter of a marker.
pub const CLOSE: &str = "}}";

/// A recognized data directive.
///
/// Table names and terms are stored trimmed and are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    /// List the table catalog.
    ListTables,
    /// Browse a table without a filter.
    Search {
        /// Table to browse.
        table: String,
        /// Maximum number of records.
        limit: usize,
    },
    /// Filter a table by a free-text term.
    Query {
        /// Table to filter.
        table: String,
        /// Search term.
        term: String,
        /// Maximum number of records.
        limit: usize,
    },
    /// Count all records in a table.
    Count {
        /// Table to count.
        table: String,
    },
}

impl Marker {
    /// Parses a complete marker such as `{{COUNT:Snapchat}}`.
    ///
    /// Returns `None` for malformed or unrecognized directives, which the
    /// engine passes through as text.
    ///
    /// # Examples
    ///
    /// ```
    /// use marksplice::marker::Marker;
    ///
    /// let marker = Marker::parse("{{SEARCH:IG Lives:5}}").unwrap();
    /// assert_eq!(marker, Marker::Search { table: "IG Lives".into(), limit: 5 });
    /// assert!(Marker::parse("{{SEARCH:IG Lives:five}}").is_none());
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let tokens = scan(text);
        match tokens.as_slice() {
            [Token::Marker { marker, raw }] if raw.len() == text.len() => Some(marker.clone()),
            _ => None,
        }
    }

    /// Short lowercase name of the directive, used in logs and diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ListTables => "tables",
            Self::Search { .. } => "search",
            Self::Query { .. } => "query",
            Self::Count { .. } => "count",
        }
    }

    /// The table this marker targets, if any.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::ListTables => None,
            Self::Search { table, .. } | Self::Query { table, .. } | Self::Count { table } => {
                Some(table)
            }
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListTables => write!(f, "{OPEN}TABLES{CLOSE}"),
            Self::Search { table, limit } => write!(f, "{OPEN}SEARCH:{table}:{limit}{CLOSE}"),
            Self::Query { table, term, limit } => {
                write!(f, "{OPEN}QUERY:{table}:{term}:{limit}{CLOSE}")
            }
            Self::Count { table } => write!(f, "{OPEN}COUNT:{table}{CLOSE}"),
        }
    }
}
