//! Corpus loading and vocabulary management.
//!
//! ## Submodules
//!
//! - [`vocab`] — Character vocabulary and one-hot encoding
//! - [`corpus`] — Reading and validating the training text

pub mod corpus;
pub mod vocab;

pub use corpus::{check_corpus_len, load_corpus};
pub use vocab::Vocabulary;
