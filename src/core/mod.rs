//! Core domain models for marksplice.
//!
//! Records and search results exchanged between data sources, the resolver,
//! and the formatter. These are pure data types with no I/O dependencies.

pub mod record;

pub use record::{Record, SearchResult};
