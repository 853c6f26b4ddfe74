//! Adagrad optimizer state.
//!
//! For every parameter element:
//! ```text
//! m += g²
//! θ -= lr · g / (√m + ε)
//! ```

use crate::core::{Params, RnnResult};

/// Running sums of squared gradients, one accumulator per parameter.
///
/// Starts at zero and only grows; it is part of every checkpoint because a
/// reset would silently change the effective step size.
#[derive(Debug, Clone, PartialEq)]
pub struct Adagrad {
    pub memory: Params,
    pub learning_rate: f64,
    pub epsilon: f64,
}

impl Adagrad {
    /// Zeroed accumulators shaped like `params`.
    #[must_use]
    pub fn new(params: &Params, learning_rate: f64, epsilon: f64) -> Self {
        Self {
            memory: params.zeros_like(),
            learning_rate,
            epsilon,
        }
    }

    /// Apply one update in place: accumulate `grads²`, then step `params`.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `params`, `grads` and the accumulators disagree
    pub fn update(&mut self, params: &mut Params, grads: &Params) -> RnnResult<()> {
        let (vocab, hidden) = (params.vocab_size(), params.hidden_size());
        grads.check_shapes(vocab, hidden)?;
        self.memory.check_shapes(vocab, hidden)?;

        let (lr, eps) = (self.learning_rate, self.epsilon);
        params.for_each_triple(grads, &mut self.memory, |theta, g, m| {
            *m += g * g;
            *theta -= lr * g / (m.sqrt() + eps);
        });
        Ok(())
    }
}
