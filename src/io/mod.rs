//! I/O utilities for marksplice.
//!
//! Input reading for the CLI and Unicode-safe chunking used to replay a
//! text file as a stream.

pub mod reader;
pub mod unicode;

pub use reader::{read_file, read_input};
pub use unicode::split_chunks;
