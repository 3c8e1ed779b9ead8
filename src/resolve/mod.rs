//! Marker resolution.
//!
//! Turns a marker into replacement text by calling the data source and the
//! formatter. A failing source call never escapes: the marker is replaced by
//! a short bracketed notice and the surrounding text is left alone.

use crate::error::SourceResult;
use crate::format::{format_records, format_table_list};
use crate::marker::{Marker, Token, scan};
use crate::source::TableSource;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves markers against a [`TableSource`].
///
/// Every occurrence is resolved on its own; nothing is cached between
/// markers.
#[derive(Clone)]
pub struct Resolver {
    source: Arc<dyn TableSource>,
    max_marker_len: usize,
}

/// A segment with its markers substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedText {
    /// Output text.
    pub text: String,
    /// Markers found in the segment.
    pub markers: usize,
    /// Markers whose source call failed and were replaced by a notice.
    pub failures: usize,
}

impl Resolver {
    /// Creates a resolver over the given source.
    #[must_use]
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Self {
            source,
            max_marker_len: usize::MAX,
        }
    }

    /// Leaves markers longer than `max_marker_len` bytes as literal text.
    ///
    /// The streaming engine sets this to its pending ceiling, so a marker
    /// too long to be held is never resolved, however it was chunked.
    #[must_use]
    pub const fn with_max_marker_len(mut self, max_marker_len: usize) -> Self {
        self.max_marker_len = max_marker_len;
        self
    }

    /// Resolves one marker, reporting source failures to the caller.
    ///
    /// # Errors
    ///
    /// Returns the source error unchanged.
    pub async fn try_resolve(&self, marker: &Marker) -> SourceResult<String> {
        match marker {
            Marker::ListTables => {
                let tables = self.source.list_tables().await?;
                Ok(format_table_list(&tables))
            }
            Marker::Search { table, limit } => {
                let result = self.source.search_table(table, *limit).await?;
                Ok(format_records(&result.records))
            }
            Marker::Query { table, term, limit } => {
                let result = self
                    .source
                    .search_table_by_term(table, term, *limit)
                    .await?;
                Ok(format_records(&result.records))
            }
            Marker::Count { table } => {
                let count = self.source.count_table(table).await?;
                Ok(count.to_string())
            }
        }
    }

    /// Resolves one marker, substituting a notice if the source fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use marksplice::core::Record;
    /// use marksplice::marker::Marker;
    /// use marksplice::resolve::Resolver;
    /// use marksplice::source::MemorySource;
    /// use std::sync::Arc;
    ///
    /// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
    /// let source = MemorySource::new().with_table("Snapchat", vec![Record::new("rec1")]);
    /// let resolver = Resolver::new(Arc::new(source));
    /// let text = resolver.resolve(&Marker::Count { table: "Snapchat".into() }).await;
    /// assert_eq!(text, "1");
    /// # });
    /// ```
    pub async fn resolve(&self, marker: &Marker) -> String {
        self.resolve_counted(marker).await.0
    }

    async fn resolve_counted(&self, marker: &Marker) -> (String, bool) {
        match self.try_resolve(marker).await {
            Ok(text) => {
                debug!(%marker, bytes = text.len(), "resolved marker");
                (text, false)
            }
            Err(e) => {
                warn!(kind = marker.kind(), %marker, error = %e, "marker resolution failed");
                (diagnostic(marker), true)
            }
        }
    }

    /// Substitutes every complete marker in `text`, keeping source order.
    ///
    /// With `concurrent` set, the markers of the segment are resolved
    /// together; otherwise one after another. Output is identical either way.
    pub async fn resolve_text(&self, text: &str, concurrent: bool) -> ResolvedText {
        let tokens: Vec<Token<'_>> = scan(text)
            .into_iter()
            .map(|token| match token {
                Token::Marker { raw, .. } if raw.len() > self.max_marker_len => {
                    debug!(bytes = raw.len(), "marker exceeds ceiling, keeping as text");
                    Token::Literal(raw)
                }
                other => other,
            })
            .collect();
        let markers: Vec<&Marker> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Marker { marker, .. } => Some(marker),
                Token::Literal(_) => None,
            })
            .collect();

        if markers.is_empty() {
            return ResolvedText {
                text: text.to_string(),
                ..ResolvedText::default()
            };
        }

        let resolved: Vec<(String, bool)> = if concurrent {
            join_all(markers.iter().map(|m| self.resolve_counted(m))).await
        } else {
            let mut out = Vec::with_capacity(markers.len());
            for marker in &markers {
                out.push(self.resolve_counted(marker).await);
            }
            out
        };

        let failures = resolved.iter().filter(|(_, failed)| *failed).count();
        let mut replacements = resolved.into_iter().map(|(text, _)| text);
        let mut output = String::with_capacity(text.len());
        for token in &tokens {
            match token {
                Token::Literal(s) => output.push_str(s),
                Token::Marker { .. } => {
                    if let Some(replacement) = replacements.next() {
                        output.push_str(&replacement);
                    }
                }
            }
        }

        ResolvedText {
            text: output,
            markers: markers.len(),
            failures,
        }
    }
}

/// Inline notice substituted for a marker whose source call failed.
///
/// # Examples
///
/// ```
/// use marksplice::marker::Marker;
/// use marksplice::resolve::diagnostic;
///
/// let marker = Marker::Search { table: "IG Lives".into(), limit: 10 };
/// assert_eq!(diagnostic(&marker), "[Error searching IG Lives]");
/// ```
#[must_use]
pub fn diagnostic(marker: &Marker) -> String {
    match marker {
        Marker::ListTables => "[Error loading tables]".to_string(),
        Marker::Search { table, .. } => format!("[Error searching {table}]"),
        Marker::Query { table, .. } => format!("[Error querying {table}]"),
        Marker::Count { table } => format!("[Error counting {table}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Record, SearchResult};
    use crate::error::SourceError;
    use crate::source::MemorySource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every call for one table, counts all calls.
    struct Flaky {
        inner: MemorySource,
        broken: &'static str,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn check(&self, table: &str) -> SourceResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if table == self.broken {
                Err(SourceError::Unavailable("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl TableSource for Flaky {
        async fn list_tables(&self) -> SourceResult<Vec<String>> {
            self.check("")?;
            self.inner.list_tables().await
        }

        async fn search_table(&self, table: &str, limit: usize) -> SourceResult<SearchResult> {
            self.check(table)?;
            self.inner.search_table(table, limit).await
        }

        async fn search_table_by_term(
            &self,
            table: &str,
            term: &str,
            limit: usize,
        ) -> SourceResult<SearchResult> {
            self.check(table)?;
            self.inner.search_table_by_term(table, term, limit).await
        }

        async fn count_table(&self, table: &str) -> SourceResult<usize> {
            self.check(table)?;
            self.inner.count_table(table).await
        }
    }

    fn flaky(broken: &'static str) -> Arc<Flaky> {
        let inner = MemorySource::new()
            .with_table(
                "Master Archive",
                vec![
                    Record::new("recVerma0001").with_field("Patient", json!("Verma")),
                    Record::new("recQuan00002").with_field("Patient", json!("Quan, Luis")),
                ],
            )
            .with_table("Snapchat", Vec::new());
        Arc::new(Flaky {
            inner,
            broken,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_resolve_tables() {
        let resolver = Resolver::new(flaky("none"));
        let text = resolver.resolve(&Marker::ListTables).await;
        assert!(text.contains("1. **Master Archive**\n2. **Snapchat**"));
    }

    #[tokio::test]
    async fn test_resolve_count_zero() {
        let resolver = Resolver::new(flaky("none"));
        let text = resolver
            .resolve(&Marker::Count {
                table: "Snapchat".to_string(),
            })
            .await;
        assert_eq!(text, "0");
    }

    #[tokio::test]
    async fn test_resolve_query() {
        let resolver = Resolver::new(flaky("none"));
        let text = resolver
            .resolve(&Marker::Query {
                table: "Master Archive".to_string(),
                term: "Luis Quan".to_string(),
                limit: 5,
            })
            .await;
        assert!(text.contains("**Patient:** Quan, Luis"));
        assert!(!text.contains("Verma"));
    }

    #[tokio::test]
    async fn test_resolve_empty_search() {
        let resolver = Resolver::new(flaky("none"));
        let text = resolver
            .resolve(&Marker::Search {
                table: "Snapchat".to_string(),
                limit: 5,
            })
            .await;
        assert_eq!(text, crate::format::NO_RECORDS);
    }

    #[tokio::test]
    async fn test_failure_becomes_diagnostic() {
        let resolver = Resolver::new(flaky("Master Archive"));
        let marker = Marker::Search {
            table: "Master Archive".to_string(),
            limit: 10,
        };
        assert!(resolver.try_resolve(&marker).await.is_err());
        assert_eq!(
            resolver.resolve(&marker).await,
            "[Error searching Master Archive]"
        );
    }

    #[test]
    fn test_diagnostics_per_kind() {
        assert_eq!(diagnostic(&Marker::ListTables), "[Error loading tables]");
        assert_eq!(
            diagnostic(&Marker::Query {
                table: "T".to_string(),
                term: "x".to_string(),
                limit: 1
            }),
            "[Error querying T]"
        );
        assert_eq!(
            diagnostic(&Marker::Count {
                table: "T".to_string()
            }),
            "[Error counting T]"
        );
    }

    #[tokio::test]
    async fn test_resolve_text_keeps_order_and_contains_failures() {
        let resolver = Resolver::new(flaky("Master Archive"));
        let out = resolver
            .resolve_text(
                "A {{COUNT:Snapchat}} B {{SEARCH:Master Archive:10}} C {{COUNT:Snapchat}} D",
                false,
            )
            .await;
        assert_eq!(out.text, "A 0 B [Error searching Master Archive] C 0 D");
        assert_eq!(out.markers, 3);
        assert_eq!(out.failures, 1);
    }

    #[tokio::test]
    async fn test_resolve_text_concurrent_matches_sequential() {
        let source = flaky("none");
        let resolver = Resolver::new(source.clone());
        let text = "x{{TABLES}}y{{COUNT:Master Archive}}z{{QUERY:Master Archive:verma:1}}";
        let sequential = resolver.resolve_text(text, false).await;
        let concurrent = resolver.resolve_text(text, true).await;
        assert_eq!(sequential, concurrent);
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_repeated_markers_are_resolved_each_time() {
        let source = flaky("none");
        let resolver = Resolver::new(source.clone());
        let out = resolver
            .resolve_text("{{COUNT:Snapchat}}{{COUNT:Snapchat}}", false)
            .await;
        assert_eq!(out.text, "00");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_markers_over_length_ceiling_stay_literal() {
        let source = flaky("none");
        let resolver = Resolver::new(source.clone()).with_max_marker_len(12);
        let out = resolver
            .resolve_text("{{COUNT:Snapchat}} {{TABLES}}", false)
            .await;
        assert!(out.text.starts_with("{{COUNT:Snapchat}} \n\n1. **Master Archive**"));
        assert_eq!(out.markers, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_without_markers_is_untouched() {
        let source = flaky("none");
        let resolver = Resolver::new(source.clone());
        let out = resolver.resolve_text("{{not a marker}} plain", false).await;
        assert_eq!(out.text, "{{not a marker}} plain");
        assert_eq!(out.markers, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
