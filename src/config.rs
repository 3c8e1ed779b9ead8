//! Engine and data source configuration.
//!
//! Both structs follow the builder style: start from `default()` and chain
//! `with_*` setters.

use crate::error::{Error, Result};

/// Default ceiling on a retained partial marker, in bytes.
pub const DEFAULT_MAX_PENDING: usize = 500;

/// Default page size when browsing a table.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default number of records scanned by a term search.
pub const DEFAULT_SCAN_LIMIT: usize = 200;

/// Characters of a record identifier shown in formatted output.
pub const DEFAULT_ID_DISPLAY_LEN: usize = 8;

/// Configuration for the streaming interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Ceiling, in bytes, on marker length.
    ///
    /// A partial marker that reaches this length is released as plain text,
    /// and a complete marker longer than it is never resolved. Output is
    /// the same however the input was chunked.
    pub max_pending: usize,
    /// Resolve the complete markers of one segment concurrently.
    pub concurrent: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            concurrent: false,
        }
    }
}

impl EngineConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the partial-marker ceiling.
    #[must_use]
    pub const fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Enables or disables concurrent resolution within a segment.
    #[must_use]
    pub const fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Checks that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_pending` is too small to hold the
    /// shortest marker.
    pub fn validate(&self) -> Result<()> {
        // "{{TABLES}}" is the shortest marker.
        if self.max_pending < 10 {
            return Err(Error::Config {
                message: format!(
                    "max_pending must be at least 10 bytes, got {}",
                    self.max_pending
                ),
            });
        }
        Ok(())
    }
}

/// Configuration shared by the data source adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Fixed table catalog. When `None`, the source declares its own tables.
    pub catalog: Option<Vec<String>>,
    /// Maximum records returned by one browse call.
    pub page_size: usize,
    /// Records examined by a term search before the limit is applied.
    pub scan_limit: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            page_size: DEFAULT_PAGE_SIZE,
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }
}

impl SourceConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed catalog of table names.
    #[must_use]
    pub fn with_catalog<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.catalog = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the browse page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the term-search scan limit.
    #[must_use]
    pub const fn with_scan_limit(mut self, scan_limit: usize) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    /// Parses a comma-separated catalog, dropping blank entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use marksplice::config::SourceConfig;
    ///
    /// let tables = SourceConfig::parse_catalog("IG Lives, Snapchat,,");
    /// assert_eq!(tables, vec!["IG Lives", "Snapchat"]);
    /// ```
    #[must_use]
    pub fn parse_catalog(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Checks that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the page size or scan limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config {
                message: "page_size must be greater than zero".to_string(),
            });
        }
        if self.scan_limit == 0 {
            return Err(Error::Config {
                message: "scan_limit must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
