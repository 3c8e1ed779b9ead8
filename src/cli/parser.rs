//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::config::{DEFAULT_MAX_PENDING, SourceConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// marksplice: resolve inline data markers in streamed LLM output.
///
/// Keeps a local record store and replays text through the streaming
/// interceptor, replacing `{{TABLES}}`, `{{SEARCH:…}}`, `{{QUERY:…}}` and
/// `{{COUNT:…}}` with data.
#[derive(Parser, Debug)]
#[command(name = "marksplice")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the record store database.
    ///
    /// Defaults to `.marksplice/records.db` in the current directory.
    #[arg(short, long, env = "MARKSPLICE_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Comma-separated table catalog reported by `{{TABLES}}`.
    ///
    /// Defaults to every table in the record store.
    #[arg(long, env = "MARKSPLICE_CATALOG", global = true)]
    pub catalog: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the record store.
    ///
    /// Creates the database file and schema if they don't exist.
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Show record store status.
    Status,

    /// Import records from a JSON file into a table.
    ///
    /// The file holds an array of objects, either `{"id": …, "fields": {…}}`
    /// or flat field maps. The table is created if needed.
    Import {
        /// Target table name.
        table: String,

        /// Path to the JSON file (`-` for stdin).
        file: PathBuf,
    },

    /// Remove a table and all of its records.
    Drop {
        /// Table name.
        table: String,

        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// List tables, as `{{TABLES}}` would.
    Tables,

    /// Browse a table, as `{{SEARCH:table:limit}}` would.
    Search {
        /// Table name.
        table: String,

        /// Maximum number of records.
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Search a table for a term, as `{{QUERY:table:term:limit}}` would.
    Query {
        /// Table name.
        table: String,

        /// Search term.
        term: String,

        /// Maximum number of records.
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Count records in a table, as `{{COUNT:table}}` would.
    Count {
        /// Table name.
        table: String,
    },

    /// Stream text through the interceptor, resolving markers.
    ///
    /// The input is replayed in chunks to simulate a token stream; output
    /// is written as soon as it is safe to release.
    Resolve {
        /// Input file (reads stdin if omitted).
        file: Option<PathBuf>,

        /// Chunk size in grapheme clusters.
        #[arg(long, default_value = "16")]
        chunk_size: usize,

        /// Delay between chunks in milliseconds.
        #[arg(long, default_value = "0")]
        delay_ms: u64,

        /// Resolve markers within a segment concurrently.
        #[arg(long)]
        concurrent: bool,

        /// Largest unclosed marker held before it is released as text.
        #[arg(long, default_value_t = DEFAULT_MAX_PENDING)]
        max_pending: usize,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::source::DEFAULT_DB_PATH))
    }

    /// Builds the source configuration from global options.
    #[must_use]
    pub fn source_config(&self) -> SourceConfig {
        let config = SourceConfig::new();
        match self.catalog.as_deref() {
            Some(list) => config.with_catalog(SourceConfig::parse_catalog(list)),
            None => config,
        }
    }
}
