//! Error types for marksplice operations.
//!
//! This module provides the error hierarchy using `thiserror` for the data
//! source adapters, the streaming engine, file I/O, and CLI commands.

use thiserror::Error;

/// Result type alias for marksplice operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by every data access port call.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Data source errors (table lookups, record queries).
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Streaming engine errors.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Errors raised by a data access port.
///
/// These never escape a resolution: the resolver turns them into an inline
/// diagnostic for the one marker that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Source not initialized (init command not run).
    #[error("record store not initialized. Run: marksplice init")]
    NotInitialized,

    /// Table not present in the record store.
    #[error("table not found: {table}")]
    TableNotFound {
        /// Table name that was requested.
        table: String,
    },

    /// Record payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The source is temporarily unreachable.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Errors on the upstream or downstream side of the interceptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The upstream producer failed; the transform terminates.
    #[error("upstream failed: {0}")]
    Upstream(String),

    /// Operation on an interceptor that already reached its terminal state.
    #[error("interceptor already closed")]
    Closed,
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write output.
    #[error("failed to write output: {reason}")]
    WriteFailed {
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Invalid UTF-8 encountered at specific byte offset.
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where invalid UTF-8 was found.
        offset: usize,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Source(SourceError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for IoError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.utf8_error().valid_up_to(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = Error::Config {
            message: "bad catalog".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad catalog");
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::NotInitialized;
        assert_eq!(
            err.to_string(),
            "record store not initialized. Run: marksplice init"
        );

        let err = SourceError::TableNotFound {
            table: "IG Lives".to_string(),
        };
        assert_eq!(err.to_string(), "table not found: IG Lives");

        let err = SourceError::Unavailable("timeout".to_string());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_stream_error_display() {
        let err = StreamError::Upstream("connection reset".to_string());
        assert_eq!(err.to_string(), "upstream failed: connection reset");
        assert_eq!(StreamError::Closed.to_string(), "interceptor already closed");
    }

    #[test]
    fn test_io_error_variants() {
        let err = IoError::FileNotFound {
            path: "/tmp/reply.txt".to_string(),
        };
        assert_eq!(err.to_string(), "file not found: /tmp/reply.txt");

        let err = IoError::InvalidUtf8 { offset: 42 };
        assert_eq!(err.to_string(), "invalid UTF-8 at byte offset 42");

        let err = IoError::WriteFailed {
            reason: "broken pipe".to_string(),
        };
        assert!(err.to_string().contains("broken pipe"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_source_and_stream() {
        let err: Error = SourceError::NotInitialized.into();
        assert!(matches!(err, Error::Source(_)));

        let err: Error = StreamError::Closed.into();
        assert!(matches!(err, Error::Stream(_)));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Source(SourceError::Database(_))));

        let err: SourceError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, SourceError::Database(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: SourceError = json_err.into();
        assert!(matches!(err, SourceError::Serialization(_)));
    }

    #[test]
    fn test_from_utf8_error() {
        let invalid_bytes = vec![b'o', b'k', 0xff];
        let utf8_err = String::from_utf8(invalid_bytes).unwrap_err();
        let err: IoError = utf8_err.into();
        assert!(matches!(err, IoError::InvalidUtf8 { offset: 2 }));
    }
}
