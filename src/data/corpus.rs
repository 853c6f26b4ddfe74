//! Training corpus loading and validation.

use std::path::Path;

use crate::core::{RnnError, RnnResult};

/// Read a UTF-8 text file fully into memory.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read or is not valid UTF-8.
pub fn load_corpus(path: &Path) -> RnnResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| RnnError::Io(format!("Failed to read {}: {}", path.display(), e)))
}

/// Check that `text` has at least `min_len` code points.
///
/// # Errors
/// - `EmptyCorpus` for empty text
/// - `CorpusTooShort` if shorter than `min_len`
pub fn check_corpus_len(text: &str, min_len: usize) -> RnnResult<usize> {
    let len = text.chars().count();
    if len == 0 {
        return Err(RnnError::EmptyCorpus);
    }
    if len < min_len {
        return Err(RnnError::CorpusTooShort { len, min: min_len });
    }
    Ok(len)
}
