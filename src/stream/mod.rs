//! Streaming marker interception.
//!
//! The [`Interceptor`] sits between a chunked text producer and its
//! consumer. Each pushed chunk is appended to a private buffer; the longest
//! prefix that cannot be part of an unfinished marker is resolved and
//! returned, and only a partial marker is kept for the next chunk. When the
//! producer finishes, whatever remains is resolved and released, even an
//! unclosed `{{`.
//!
//! Output order always matches input order: each marker is replaced in
//! place, text is never repeated, and nothing already emitted is revisited.
//!
//! ```text
//!  AwaitingChunk ──push──▶ Accumulating ──▶ Resolving ──▶ Flushing ──▶ AwaitingChunk
//!        │                                                        (or Accumulating
//!        │                                                         if a partial
//!        └──finish──▶ Draining ──▶ Closed                          marker is held)
//! ```

mod adapter;
mod decode;

pub use adapter::{intercept, intercept_bytes};
pub use decode::Utf8Decoder;

use crate::config::EngineConfig;
use crate::error::StreamError;
use crate::marker::hold_point;
use crate::resolve::Resolver;
use crate::source::TableSource;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the interceptor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Buffer empty, waiting for the next chunk.
    AwaitingChunk,
    /// Holding a partial marker, or evaluating a freshly appended chunk.
    Accumulating,
    /// Releasing a prefix that needs no resolution.
    Flushing,
    /// Waiting on the data source for a marker.
    Resolving,
    /// Upstream finished; releasing the remainder.
    Draining,
    /// Terminal.
    Closed,
}

/// Counters for one intercepted stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterceptorStats {
    /// Chunks received from upstream.
    pub chunks_in: usize,
    /// Non-empty pieces released downstream.
    pub chunks_out: usize,
    /// Bytes received.
    pub bytes_in: usize,
    /// Bytes released.
    pub bytes_out: usize,
    /// Markers resolved, including failed ones.
    pub markers: usize,
    /// Markers replaced by an error notice.
    pub failures: usize,
    /// Partial markers released as text for exceeding the size ceiling.
    pub overflows: usize,
}

/// Per-stream marker interceptor. Owns its buffer exclusively; create one
/// per stream.
///
/// # Examples
///
/// ```
/// use marksplice::core::Record;
/// use marksplice::source::MemorySource;
/// use marksplice::stream::Interceptor;
/// use std::sync::Arc;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let source = MemorySource::new().with_table("IG Lives", vec![Record::new("rec1")]);
/// let mut interceptor = Interceptor::new(Arc::new(source));
///
/// let mut out = interceptor.push("There are {{COU").await.unwrap();
/// out += &interceptor.push("NT:IG Lives}} lives.").await.unwrap();
/// out += &interceptor.finish().await.unwrap();
/// assert_eq!(out, "There are 1 lives.");
/// # });
/// ```
pub struct Interceptor {
    resolver: Resolver,
    config: EngineConfig,
    buffer: String,
    state: EngineState,
    stats: InterceptorStats,
}

impl Interceptor {
    /// Creates an interceptor with default configuration.
    #[must_use]
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    /// Creates an interceptor with the given configuration.
    #[must_use]
    pub fn with_config(source: Arc<dyn TableSource>, config: EngineConfig) -> Self {
        Self::from_resolver(Resolver::new(source), config)
    }

    /// Creates an interceptor around an existing resolver.
    ///
    /// The resolver leaves markers longer than `config.max_pending` as text.
    #[must_use]
    pub const fn from_resolver(resolver: Resolver, config: EngineConfig) -> Self {
        Self {
            resolver: resolver.with_max_marker_len(config.max_pending),
            config,
            buffer: String::new(),
            state: EngineState::AwaitingChunk,
            stats: InterceptorStats {
                chunks_in: 0,
                chunks_out: 0,
                bytes_in: 0,
                bytes_out: 0,
                markers: 0,
                failures: 0,
                overflows: 0,
            },
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Text received but not yet released.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> &InterceptorStats {
        &self.stats
    }

    /// Appends a chunk and returns the text that is now safe to release.
    ///
    /// The result is empty when the whole buffer may still be the start of
    /// a marker.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] after [`finish`](Self::finish) or
    /// [`abort`](Self::abort).
    pub async fn push(&mut self, chunk: &str) -> Result<String, StreamError> {
        if self.state == EngineState::Closed {
            return Err(StreamError::Closed);
        }
        self.state = EngineState::Accumulating;
        self.stats.chunks_in += 1;
        self.stats.bytes_in += chunk.len();
        self.buffer.push_str(chunk);

        let split = hold_point(&self.buffer);
        let held = self.buffer.split_off(split);
        let mut ready = std::mem::replace(&mut self.buffer, held);

        // A held marker can only close at a greater length, which is too long
        // to resolve.
        if self.buffer.len() >= self.config.max_pending {
            warn!(
                bytes = self.buffer.len(),
                max = self.config.max_pending,
                "unclosed marker exceeds ceiling, releasing as text"
            );
            self.stats.overflows += 1;
            ready.push_str(&self.buffer);
            self.buffer.clear();
        }

        let out = self.release(&ready).await;
        self.state = if self.buffer.is_empty() {
            EngineState::AwaitingChunk
        } else {
            debug!(held = self.buffer.len(), "holding partial marker");
            EngineState::Accumulating
        };
        Ok(out)
    }

    /// Signals end of input: resolves and returns everything still held.
    ///
    /// A dangling `{{` is released verbatim since nothing can close it now.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] if the interceptor is already closed.
    pub async fn finish(&mut self) -> Result<String, StreamError> {
        if self.state == EngineState::Closed {
            return Err(StreamError::Closed);
        }
        self.state = EngineState::Draining;
        let rest = std::mem::take(&mut self.buffer);
        let out = self.release(&rest).await;
        self.state = EngineState::Closed;
        info!(
            chunks_in = self.stats.chunks_in,
            chunks_out = self.stats.chunks_out,
            markers = self.stats.markers,
            failures = self.stats.failures,
            "stream finished"
        );
        Ok(out)
    }

    /// Terminates after an upstream failure, discarding held text.
    pub fn abort(&mut self) {
        if !self.buffer.is_empty() {
            debug!(discarded = self.buffer.len(), "aborting with held text");
        }
        self.buffer.clear();
        self.state = EngineState::Closed;
    }

    async fn release(&mut self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        self.state = EngineState::Resolving;
        let resolved = self.resolver.resolve_text(text, self.config.concurrent).await;
        self.state = EngineState::Flushing;

        self.stats.markers += resolved.markers;
        self.stats.failures += resolved.failures;
        if !resolved.text.is_empty() {
            self.stats.chunks_out += 1;
            self.stats.bytes_out += resolved.text.len();
        }
        if resolved.markers > 0 {
            debug!(
                markers = resolved.markers,
                failures = resolved.failures,
                "resolved segment"
            );
        }
        resolved.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;
    use crate::source::MemorySource;
    use serde_json::json;

    fn interceptor(config: EngineConfig) -> Interceptor {
        let source = MemorySource::new()
            .with_table(
                "Master Archive",
                vec![Record::new("recVerma0001").with_field("Patient", json!("Verma"))],
            )
            .with_table("Snapchat", Vec::new());
        Interceptor::with_config(Arc::new(source), config)
    }

    async fn run_with(config: EngineConfig, chunks: &[&str]) -> (Vec<String>, InterceptorStats) {
        let mut engine = interceptor(config);
        let mut outputs = Vec::new();
        for chunk in chunks {
            outputs.push(engine.push(chunk).await.unwrap());
        }
        outputs.push(engine.finish().await.unwrap());
        (outputs, *engine.stats())
    }

    async fn run(chunks: &[&str]) -> (Vec<String>, InterceptorStats) {
        run_with(EngineConfig::default(), chunks).await
    }

    #[tokio::test]
    async fn test_plain_text_passes_through_immediately() {
        let (outputs, stats) = run(&["Hello ", "world"]).await;
        assert_eq!(outputs, vec!["Hello ", "world", ""]);
        assert_eq!(stats.markers, 0);
    }

    #[tokio::test]
    async fn test_split_marker_is_held_then_resolved() {
        let (outputs, _) = run(&["Count: {{SEA", "RCH:Snapchat:5}} done"]).await;
        assert_eq!(outputs[0], "Count: ");
        assert_eq!(outputs[1], "_No records found._ done");
    }

    #[tokio::test]
    async fn test_trailing_brace_is_held() {
        let (outputs, _) = run(&["a {", "{COUNT:Snapchat}} b"]).await;
        assert_eq!(outputs[0], "a ");
        assert_eq!(outputs[1], "0 b");
    }

    #[tokio::test]
    async fn test_lone_brace_released_when_next_chunk_is_not_brace() {
        let (outputs, _) = run(&["set {", "x}"]).await;
        assert_eq!(outputs.concat(), "set {x}");
    }

    #[tokio::test]
    async fn test_dangling_marker_emitted_at_end() {
        let (outputs, _) = run(&["before {{QUERY:X"]).await;
        assert_eq!(outputs, vec!["before ", "{{QUERY:X"]);
    }

    #[tokio::test]
    async fn test_two_markers_in_one_chunk() {
        let (outputs, stats) = run(&["[{{COUNT:Snapchat}}|{{COUNT:Master Archive}}]"]).await;
        assert_eq!(outputs[0], "[0|1]");
        assert_eq!(stats.markers, 2);
    }

    #[tokio::test]
    async fn test_malformed_marker_passes_once_closed() {
        let (outputs, stats) = run(&["{{SEARCH:Snap", "chat:many}} ok"]).await;
        assert_eq!(outputs.concat(), "{{SEARCH:Snapchat:many}} ok");
        assert_eq!(stats.markers, 0);
    }

    #[tokio::test]
    async fn test_overflow_releases_partial_marker() {
        let mut engine = interceptor(EngineConfig::new().with_max_pending(16));
        let first = engine.push("x {{COUNT:").await.unwrap();
        assert_eq!(first, "x ");
        assert_eq!(engine.pending(), "{{COUNT:");
        let second = engine.push("this is far too long").await.unwrap();
        assert_eq!(second, "{{COUNT:this is far too long");
        assert!(engine.pending().is_empty());
        assert_eq!(engine.stats().overflows, 1);
    }

    #[tokio::test]
    async fn test_oversized_marker_is_text_however_chunked() {
        let input = "n={{COUNT:Master Archive}}";
        let config = EngineConfig::new().with_max_pending(20);

        let (whole, whole_stats) = run_with(config, &[input]).await;
        let chars: Vec<String> = input.chars().map(String::from).collect();
        let chars: Vec<&str> = chars.iter().map(String::as_str).collect();
        let (split, split_stats) = run_with(config, &chars).await;

        assert_eq!(whole.concat(), input);
        assert_eq!(split.concat(), input);
        assert_eq!(whole_stats.markers, 0);
        assert_eq!(split_stats.markers, 0);
        assert_eq!(split_stats.overflows, 1);
    }

    #[tokio::test]
    async fn test_marker_at_ceiling_resolves_however_chunked() {
        let input = "n={{COUNT:Master Archive}}";
        let config = EngineConfig::new().with_max_pending(24);

        let (whole, _) = run_with(config, &[input]).await;
        let chars: Vec<String> = input.chars().map(String::from).collect();
        let chars: Vec<&str> = chars.iter().map(String::as_str).collect();
        let (split, stats) = run_with(config, &chars).await;

        assert_eq!(whole.concat(), "n=1");
        assert_eq!(split.concat(), "n=1");
        assert_eq!(stats.overflows, 0);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let mut engine = interceptor(EngineConfig::default());
        assert_eq!(engine.state(), EngineState::AwaitingChunk);
        engine.push("text {{TAB").await.unwrap();
        assert_eq!(engine.state(), EngineState::Accumulating);
        engine.push("LES}}").await.unwrap();
        assert_eq!(engine.state(), EngineState::AwaitingChunk);
        engine.finish().await.unwrap();
        assert_eq!(engine.state(), EngineState::Closed);
        assert_eq!(engine.push("late").await, Err(StreamError::Closed));
        assert_eq!(engine.finish().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_abort_discards_held_text() {
        let mut engine = interceptor(EngineConfig::default());
        engine.push("{{COUNT:Snap").await.unwrap();
        engine.abort();
        assert!(engine.pending().is_empty());
        assert_eq!(engine.state(), EngineState::Closed);
    }

    #[tokio::test]
    async fn test_stats_track_bytes() {
        let (outputs, stats) = run(&["ab", "{{COUNT:Snapchat}}"]).await;
        assert_eq!(outputs.concat(), "ab0");
        assert_eq!(stats.chunks_in, 2);
        assert_eq!(stats.chunks_out, 2);
        assert_eq!(stats.bytes_in, 20);
        assert_eq!(stats.bytes_out, 3);
    }
}
