//! In-process table source.

use super::TableSource;
use super::matching::filter_by_term;
use crate::config::SourceConfig;
use crate::core::{Record, SearchResult};
use crate::error::SourceResult;
use async_trait::async_trait;
use tracing::debug;

/// A [`TableSource`] backed by tables held in memory.
///
/// Tables keep insertion order, which is also the browse order.
///
/// # Examples
///
/// ```
/// use marksplice::core::Record;
/// use marksplice::source::MemorySource;
///
/// let source = MemorySource::new()
///     .with_table("IG Lives", vec![Record::new("rec1"), Record::new("rec2")])
///     .with_table("Snapchat", Vec::new());
/// assert_eq!(source.table_names(), vec!["IG Lives", "Snapchat"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Vec<(String, Vec<Record>)>,
    config: SourceConfig,
}

impl MemorySource {
    /// Creates an empty source with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty source with the given configuration.
    #[must_use]
    pub const fn with_config(config: SourceConfig) -> Self {
        Self {
            tables: Vec::new(),
            config,
        }
    }

    /// Adds a table, replacing any table of the same name.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        let name = name.into();
        match self.tables.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = records,
            None => self.tables.push((name, records)),
        }
        self
    }

    /// Names of the stored tables, in insertion order.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|(name, _)| name.clone()).collect()
    }

    fn records(&self, table: &str) -> &[Record] {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, records)| records.as_slice())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TableSource for MemorySource {
    async fn list_tables(&self) -> SourceResult<Vec<String>> {
        Ok(self
            .config
            .catalog
            .clone()
            .unwrap_or_else(|| self.table_names()))
    }

    async fn search_table(&self, table: &str, limit: usize) -> SourceResult<SearchResult> {
        let take = limit.min(self.config.page_size);
        let records: Vec<Record> = self.records(table).iter().take(take).cloned().collect();
        debug!(table, limit, found = records.len(), "memory browse");
        Ok(SearchResult::from_records(records))
    }

    async fn search_table_by_term(
        &self,
        table: &str,
        term: &str,
        limit: usize,
    ) -> SourceResult<SearchResult> {
        if term.trim().is_empty() {
            return self.search_table(table, limit).await;
        }
        let scanned = self
            .records(table)
            .iter()
            .take(self.config.scan_limit)
            .cloned();
        let records = filter_by_term(scanned, term, limit);
        debug!(table, term, limit, found = records.len(), "memory term search");
        Ok(SearchResult::from_records(records))
    }

    async fn count_table(&self, table: &str) -> SourceResult<usize> {
        Ok(self.records(table).len())
    }
}
