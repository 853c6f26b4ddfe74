//! Character vocabulary built from the training corpus.
//!
//! Indices are assigned in first-occurrence order, so the same text always
//! yields the same mapping but a different text may not. Checkpoints persist
//! the vocabulary rather than rebuilding it.

use ndarray::Array1;
use std::collections::HashMap;

use crate::core::{RnnError, RnnResult};
use crate::utils::one_hot;

/// Bidirectional mapping between characters and dense indices `[0, size)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    /// Characters in index order (index → char).
    pub chars: Vec<char>,
    /// Reverse mapping from character to index.
    pub char_to_idx: HashMap<char, usize>,
}

impl Vocabulary {
    /// Scan `text` once, giving each newly seen character the next index.
    ///
    /// Text is read as Unicode code points, not bytes.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut chars = Vec::new();
        let mut char_to_idx = HashMap::new();
        for c in text.chars() {
            char_to_idx.entry(c).or_insert_with(|| {
                chars.push(c);
                chars.len() - 1
            });
        }
        Self { chars, char_to_idx }
    }

    /// Rebuild a vocabulary from characters already in index order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a character appears twice.
    pub fn from_chars(chars: Vec<char>) -> RnnResult<Self> {
        let mut char_to_idx = HashMap::with_capacity(chars.len());
        for (i, &c) in chars.iter().enumerate() {
            if char_to_idx.insert(c, i).is_some() {
                return Err(RnnError::InvalidConfig(format!(
                    "duplicate vocabulary character {c:?}"
                )));
            }
        }
        Ok(Self { chars, char_to_idx })
    }

    /// Number of characters in the vocabulary.
    #[must_use]
    pub fn size(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Get the index for a character, or `None` if not in vocabulary.
    #[must_use]
    pub fn char_to_index(&self, c: char) -> Option<usize> {
        self.char_to_idx.get(&c).copied()
    }

    /// Get the character for an index, or `None` if out of bounds.
    #[must_use]
    pub fn index_to_char(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).copied()
    }

    /// One-hot encode a character as a vector of length `self.size()`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCharacter` if `c` is not in the vocabulary.
    pub fn one_hot(&self, c: char) -> RnnResult<Array1<f64>> {
        let idx = self
            .char_to_index(c)
            .ok_or(RnnError::UnknownCharacter(c))?;
        Ok(one_hot(idx, self.size()))
    }

    /// Map every character of `text` to its index.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCharacter` for the first character not in the vocabulary.
    pub fn encode(&self, text: &str) -> RnnResult<Vec<usize>> {
        text.chars()
            .map(|c| self.char_to_index(c).ok_or(RnnError::UnknownCharacter(c)))
            .collect()
    }

    /// Map indices back to a string.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` for the first index outside the vocabulary.
    pub fn decode(&self, indices: &[usize]) -> RnnResult<String> {
        indices
            .iter()
            .map(|&idx| {
                self.index_to_char(idx).ok_or(RnnError::IndexOutOfRange {
                    index: idx,
                    size: self.size(),
                })
            })
            .collect()
    }
}
