//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::SearchResult;
use crate::error::Error;
use crate::format::{format_records, format_table_list};
use crate::source::SourceStats;
use crate::stream::InterceptorStats;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &SourceStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json => format_json(stats),
    }
}

fn format_status_text(stats: &SourceStats) -> String {
    let mut output = String::new();
    output.push_str("marksplice status\n");
    output.push_str("=================\n\n");
    let _ = writeln!(output, "  Tables:        {}", stats.tables.len());
    let _ = writeln!(output, "  Records:       {}", stats.record_count);
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {}", format_size(size));
    }
    if !stats.tables.is_empty() {
        output.push('\n');
        let _ = writeln!(output, "  {:<30} {:>8}", "Table", "Records");
        output.push_str("  ");
        output.push_str(&"-".repeat(39));
        output.push('\n');
        for table in &stats.tables {
            let _ = writeln!(
                output,
                "  {:<30} {:>8}",
                truncate(&table.name, 30),
                table.records
            );
        }
    }
    output
}

/// Formats the table catalog.
#[must_use]
pub fn format_tables(tables: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if tables.is_empty() {
                return "No tables found.\n".to_string();
            }
            format!("{}\n", format_table_list(tables).trim())
        }
        OutputFormat::Json => format_json(&tables),
    }
}

/// Formats a search result.
#[must_use]
pub fn format_search_result(result: &SearchResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{}\n", format_records(&result.records).trim()),
        OutputFormat::Json => format_json(result),
    }
}

/// Formats a table count.
#[must_use]
pub fn format_count(table: &str, count: usize, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{count}\n"),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Count<'a> {
                table: &'a str,
                count: usize,
            }
            format_json(&Count { table, count })
        }
    }
}

/// Formats the result of an import.
#[must_use]
pub fn format_import(table: &str, ids: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("Imported {} records into {table}\n", ids.len()),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Import<'a> {
                table: &'a str,
                imported: usize,
                ids: &'a [String],
            }
            format_json(&Import {
                table,
                imported: ids.len(),
                ids,
            })
        }
    }
}

/// Formats the result of dropping a table.
#[must_use]
pub fn format_drop(table: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("Dropped table: {table}\n"),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Dropped<'a> {
                table: &'a str,
                dropped: bool,
            }
            format_json(&Dropped {
                table,
                dropped: true,
            })
        }
    }
}

/// Formats the summary of a resolve run.
///
/// Text output is streamed as it is produced, so only JSON has a summary.
#[must_use]
pub fn format_resolve(output: &str, stats: &InterceptorStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => String::new(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Resolve<'a> {
                output: &'a str,
                stats: &'a InterceptorStats,
            }
            format_json(&Resolve { output, stats })
        }
    }
}

/// Formats an error for output.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }
            format_json(&ErrorOutput {
                error: error.to_string(),
            })
        }
    }
}

/// Formats a value as pretty JSON.
fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
