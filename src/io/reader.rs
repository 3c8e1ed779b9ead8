//! Input reading.

use crate::error::{IoError, Result};
use std::io::Read;
use std::path::Path;

/// Maximum input size to read into memory (64MB).
const MAX_INPUT_SIZE: u64 = 64 * 1024 * 1024;

/// Reads a UTF-8 file to a string.
///
/// # Errors
///
/// Returns an error if the file doesn't exist, is too large, can't be read,
/// or is not valid UTF-8.
///
/// # Examples
///
/// ```no_run
/// use marksplice::io::read_file;
///
/// let content = read_file("reply.md").unwrap();
/// ```
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();
    let path_str = path_ref.to_string_lossy().to_string();

    if !path_ref.exists() {
        return Err(IoError::FileNotFound { path: path_str }.into());
    }

    let metadata = std::fs::metadata(path_ref).map_err(|e| IoError::ReadFailed {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    if metadata.len() > MAX_INPUT_SIZE {
        return Err(IoError::ReadFailed {
            path: path_str,
            reason: format!(
                "file too large: {} bytes (max: {MAX_INPUT_SIZE} bytes)",
                metadata.len()
            ),
        }
        .into());
    }

    let bytes = std::fs::read(path_ref).map_err(|e| IoError::ReadFailed {
        path: path_str,
        reason: e.to_string(),
    })?;
    Ok(String::from_utf8(bytes).map_err(IoError::from)?)
}

/// Reads from a file, or from stdin when `path` is `None` or `-`.
///
/// # Errors
///
/// Returns an error if reading fails or the input is not valid UTF-8.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => read_file(p),
        _ => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .take(MAX_INPUT_SIZE)
                .read_to_end(&mut bytes)
                .map_err(|e| IoError::ReadFailed {
                    path: "<stdin>".to_string(),
                    reason: e.to_string(),
                })?;
            Ok(String::from_utf8(bytes).map_err(IoError::from)?)
        }
    }
}
