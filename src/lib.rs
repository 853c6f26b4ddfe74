//! # char-rnn
//!
//! A character-level recurrent neural network trained with truncated
//! backpropagation-through-time and Adagrad.
//!
//! ## Overview
//!
//! The model is a single tanh layer unrolled over a fixed window of characters:
//!
//! ```text
//! h_t = tanh(Wxh x_t + Whh h_{t-1} + bh)
//! y_t = Why h_t + by
//! p_t = softmax(y_t)
//! ```
//!
//! Training slides a window across the corpus, carrying the hidden state from
//! one window to the next, and periodically samples text and writes a
//! checkpoint that captures every piece of state needed to resume exactly.
//!
//! ## Structure
//!
//! - [`core`] — Parameter set, single recurrence step, forward/backward pass
//! - [`data`] — Vocabulary construction and corpus loading
//! - [`training`] — Adagrad optimizer state and the training loop
//! - [`sampling`] — Categorical sampling of generated text
//! - [`checkpoint`] — Versioned binary checkpoints with atomic writes
//! - [`utils`] — Dense matrix helpers on top of `ndarray`

pub mod checkpoint;
pub mod core;
pub mod data;
pub mod sampling;
pub mod training;
pub mod utils;

use serde::{Deserialize, Serialize};

pub use crate::core::{ForwardBackward, Params, RnnError, RnnResult};
pub use checkpoint::{load_checkpoint, save_checkpoint, try_load_checkpoint};
pub use data::{load_corpus, Vocabulary};
pub use sampling::{sample, sample_with_temperature};
pub use training::{Adagrad, TrainEvent, Trainer};

/// Hyperparameters for the network and the training loop.
///
/// Stored inside every checkpoint so a resumed run continues with the exact
/// settings it was started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of hidden units.
    pub hidden_size: usize,
    /// Number of characters unrolled per BPTT window.
    pub seq_length: usize,
    /// Adagrad learning rate.
    pub learning_rate: f64,
    /// Adagrad denominator fudge term.
    pub adagrad_epsilon: f64,
    /// Gradients are clamped element-wise to `[-grad_clip, grad_clip]`.
    pub grad_clip: f64,
    /// Standard deviation of the initial weights.
    pub init_scale: f64,
    /// Sample text and report progress every N iterations.
    pub sample_every: usize,
    /// Number of characters generated per sample. Also the minimum corpus length.
    pub sample_len: usize,
    /// Write a checkpoint every N iterations.
    pub checkpoint_every: usize,
    /// Weight of the newest loss in the exponentially smoothed loss; the
    /// running value keeps `1 - loss_weight`.
    pub loss_weight: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hidden_size: 100,
            seq_length: 25,
            learning_rate: 0.1,
            adagrad_epsilon: 1e-8,
            grad_clip: 5.0,
            init_scale: 0.01,
            sample_every: 100,
            sample_len: 200,
            checkpoint_every: 1000,
            loss_weight: 0.001,
        }
    }
}

impl Config {
    /// Check that every field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RnnError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> RnnResult<()> {
        let positive_sizes = [
            ("hidden_size", self.hidden_size),
            ("seq_length", self.seq_length),
            ("sample_every", self.sample_every),
            ("sample_len", self.sample_len),
            ("checkpoint_every", self.checkpoint_every),
        ];
        for (name, value) in positive_sizes {
            if value == 0 {
                return Err(RnnError::InvalidConfig(format!("{name} must be > 0")));
            }
        }

        let positive_rates = [
            ("learning_rate", self.learning_rate),
            ("adagrad_epsilon", self.adagrad_epsilon),
            ("grad_clip", self.grad_clip),
            ("init_scale", self.init_scale),
        ];
        for (name, value) in positive_rates {
            if !(value.is_finite() && value > 0.0) {
                return Err(RnnError::InvalidConfig(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }

        if !(self.loss_weight > 0.0 && self.loss_weight <= 1.0) {
            return Err(RnnError::InvalidConfig(format!(
                "loss_weight must lie in (0, 1], got {}",
                self.loss_weight
            )));
        }

        Ok(())
    }

    /// Minimum number of characters a corpus needs for this configuration:
    /// one full sample, and at least one input/target window.
    #[must_use]
    pub fn min_corpus_len(&self) -> usize {
        self.sample_len.max(self.seq_length + 1)
    }
}
