//! Data access port.
//!
//! The resolver talks to the external tabular source only through the
//! [`TableSource`] trait. Two adapters ship with the crate: [`MemorySource`]
//! for in-process catalogs and [`SqliteSource`] for a persistent record store.

pub mod import;
pub mod matching;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use import::{NewRecord, parse_records};
pub use matching::{filter_by_term, record_matches, term_variations};
pub use memory::MemorySource;
pub use sqlite::{SourceStats, SqliteSource, TableStats};

use crate::core::SearchResult;
use crate::error::SourceResult;
use async_trait::async_trait;

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".marksplice/records.db";

/// Asynchronous capability over a catalog of named tables.
///
/// Every call reports failure through [`SourceResult`] instead of panicking,
/// so callers must handle the error case. Implementations return an empty
/// result for unknown or empty tables, and `count_table` degrades to zero on
/// failure. Timeouts, if any, belong to the implementation.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Returns the table catalog in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    async fn list_tables(&self) -> SourceResult<Vec<String>>;

    /// Returns up to `limit` records of `table` in browse order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source fails.
    async fn search_table(&self, table: &str, limit: usize) -> SourceResult<SearchResult>;

    /// Returns up to `limit` records of `table` whose field values contain
    /// `term` (case-insensitive), including reordered two-part names.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source fails.
    async fn search_table_by_term(
        &self,
        table: &str,
        term: &str,
        limit: usize,
    ) -> SourceResult<SearchResult>;

    /// Counts every record in `table`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the implementation chooses not to degrade
    /// to zero.
    async fn count_table(&self, table: &str) -> SourceResult<usize>;
}
