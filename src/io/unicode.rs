//! Unicode helpers for splitting text into stream chunks.

use unicode_segmentation::UnicodeSegmentation;

/// Splits text into chunks of at most `size` grapheme clusters.
///
/// Concatenating the chunks gives back the input. A `size` of zero yields
/// the whole text as one chunk.
///
/// # Examples
///
/// ```
/// use marksplice::io::split_chunks;
///
/// assert_eq!(split_chunks("abcde", 2), vec!["ab", "cd", "e"]);
/// ```
#[must_use]
pub fn split_chunks(text: &str, size: usize) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (offset, _)) in text.grapheme_indices(true).enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(&text[start..offset]);
            start = offset;
        }
    }
    chunks.push(&text[start..]);
    chunks
}
