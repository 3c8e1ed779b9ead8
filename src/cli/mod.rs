//! CLI layer for marksplice.
//!
//! Provides the command-line interface using clap, with commands for
//! managing the local record store and streaming text through the
//! interceptor.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
