//! # marksplice
//!
//! Streaming marker interception for LLM output.
//!
//! A language model is told it can embed data directives such as
//! `{{COUNT:IG Lives}}` or `{{QUERY:Master Archive:Luis Quan:5}}` in its
//! reply. marksplice sits between the model's token stream and the client:
//! it forwards text as soon as it is safe, holds back only what might be the
//! start of a marker, and splices in Markdown rendered from a tabular data
//! source once a marker is complete.
//!
//! ## Features
//!
//! - **Chunk-boundary safe**: the same input gives the same output however
//!   the stream is split
//! - **Failure containment**: a failing lookup becomes an inline notice, the
//!   stream carries on
//! - **Pluggable sources**: anything implementing [`TableSource`], with an
//!   in-memory catalog and a `SQLite` record store included
//! - **Byte streams**: UTF-8 reassembly across chunk boundaries
//!
//! ## Example
//!
//! ```
//! use futures_util::StreamExt;
//! use marksplice::core::Record;
//! use marksplice::source::MemorySource;
//! use marksplice::stream::{Interceptor, intercept};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let source = MemorySource::new()
//!     .with_table("IG Lives", vec![Record::new("rec1"), Record::new("rec2")]);
//! let tokens = ["We hosted {{CO", "UNT:IG Li", "ves}} lives."];
//! let upstream = futures_util::stream::iter(tokens.map(|t| Ok::<_, String>(t.to_string())));
//!
//! let pieces: Vec<_> = intercept(upstream, Interceptor::new(Arc::new(source)))
//!     .collect()
//!     .await;
//! let reply: String = pieces.into_iter().map(Result::unwrap).collect();
//! assert_eq!(reply, "We hosted 2 lives.");
//! # });
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod io;
pub mod marker;
pub mod resolve;
pub mod source;
pub mod stream;

// Re-export commonly used types at crate root
pub use error::{Error, Result, SourceError, SourceResult, StreamError};

// Re-export core domain types
pub use core::{Record, SearchResult};

// Re-export configuration
pub use config::{EngineConfig, SourceConfig};

// Re-export marker grammar
pub use marker::Marker;

// Re-export the data access port and its adapters
pub use source::{DEFAULT_DB_PATH, MemorySource, SqliteSource, TableSource};

// Re-export the engine
pub use resolve::{Resolver, diagnostic};
pub use stream::{EngineState, Interceptor, InterceptorStats, intercept, intercept_bytes};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
