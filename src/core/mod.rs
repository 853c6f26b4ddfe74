//! Core RNN algorithm implementation.
//!
//! This module provides the learnable parameter set and the numerical passes
//! that run over it:
//! - A single recurrence step (shared by training and sampling)
//! - The unrolled forward pass with softmax cross-entropy loss
//! - Backpropagation-through-time with element-wise gradient clipping
//!
//! ## Recurrence
//!
//! ```text
//! h_t = tanh(Wxh x_t + Whh h_{t-1} + bh)
//! y_t = Why h_t + by
//! p_t = softmax(y_t)
//! L   = Σ_t -log p_t[target_t]
//! ```
//!
//! `x_t` is the one-hot encoding of input character `t`, so `Wxh x_t` is
//! simply column `t` of `Wxh`.

use ndarray::{Array1, Array2, Zip};
use rand::Rng;
use std::error::Error;
use std::fmt;

use crate::utils::{clip_inplace, d_tanh_from_output, log_sum_exp, outer, randn, tanh};

/// Error type for RNN operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RnnError {
    /// Invalid hyperparameters or network dimensions
    InvalidConfig(String),
    /// Shape mismatch in matrix operations
    ShapeMismatch(String),
    /// Corpus contains no characters
    EmptyCorpus,
    /// Corpus is shorter than one sample/window
    CorpusTooShort { len: usize, min: usize },
    /// Character not present in the vocabulary
    UnknownCharacter(char),
    /// Character index outside `[0, vocab_size)`
    IndexOutOfRange { index: usize, size: usize },
    /// Categorical distribution could not be built
    Sampling(String),
    /// Filesystem failure
    Io(String),
    /// Checkpoint present but undecodable or inconsistent
    Checkpoint(String),
    /// Checkpoint written by an incompatible format version
    VersionMismatch { found: u32, expected: u32 },
}

impl fmt::Display for RnnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RnnError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            RnnError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            RnnError::EmptyCorpus => write!(f, "Corpus is empty"),
            RnnError::CorpusTooShort { len, min } => {
                write!(f, "Corpus length: {}, must be >= {}", len, min)
            }
            RnnError::UnknownCharacter(c) => write!(f, "Character {:?} is not in the vocabulary", c),
            RnnError::IndexOutOfRange { index, size } => {
                write!(f, "Index {} out of range for vocabulary of size {}", index, size)
            }
            RnnError::Sampling(msg) => write!(f, "Sampling failed: {}", msg),
            RnnError::Io(msg) => write!(f, "I/O error: {}", msg),
            RnnError::Checkpoint(msg) => write!(f, "Corrupt checkpoint: {}", msg),
            RnnError::VersionMismatch { found, expected } => write!(
                f,
                "Checkpoint format version {} is not supported (expected {})",
                found, expected
            ),
        }
    }
}

impl Error for RnnError {}

pub type RnnResult<T> = Result<T, RnnError>;

/// The five learnable tensors of a single-layer tanh RNN.
///
/// # Shapes
///
/// - `wxh`: `(hidden, vocab)` input to hidden
/// - `whh`: `(hidden, hidden)` hidden to hidden
/// - `why`: `(vocab, hidden)` hidden to output
/// - `bh`: `(hidden)` hidden bias
/// - `by`: `(vocab)` output bias
///
/// The same struct carries gradients and Adagrad accumulators, which share
/// these shapes one-for-one.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub wxh: Array2<f64>,
    pub whh: Array2<f64>,
    pub why: Array2<f64>,
    pub bh: Array1<f64>,
    pub by: Array1<f64>,
}

/// Output of one forward/backward pass over a window.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardBackward {
    /// Summed cross-entropy loss over the window (nats).
    pub loss: f64,
    /// Clipped gradients, one per parameter.
    pub grads: Params,
    /// Hidden state after the last timestep, carried into the next window.
    pub h_last: Array1<f64>,
}

impl Params {
    /// Create a parameter set for the given vocabulary and hidden sizes.
    ///
    /// Weights are drawn i.i.d. from `N(0, 1)` and scaled by `init_scale`;
    /// biases start at zero.
    ///
    /// # Errors
    /// - `InvalidConfig` if either dimension is zero
    pub fn new<R: Rng + ?Sized>(
        vocab_size: usize,
        hidden_size: usize,
        init_scale: f64,
        rng: &mut R,
    ) -> RnnResult<Self> {
        if vocab_size == 0 {
            return Err(RnnError::InvalidConfig(
                "vocab_size must be > 0 (empty corpus?)".to_string(),
            ));
        }
        if hidden_size == 0 {
            return Err(RnnError::InvalidConfig("hidden_size must be > 0".to_string()));
        }

        Ok(Self {
            wxh: randn((hidden_size, vocab_size), init_scale, rng),
            whh: randn((hidden_size, hidden_size), init_scale, rng),
            why: randn((vocab_size, hidden_size), init_scale, rng),
            bh: Array1::zeros(hidden_size),
            by: Array1::zeros(vocab_size),
        })
    }

    /// All-zero tensors with the shapes of a `(vocab_size, hidden_size)` network.
    #[must_use]
    pub fn zeros(vocab_size: usize, hidden_size: usize) -> Self {
        Self {
            wxh: Array2::zeros((hidden_size, vocab_size)),
            whh: Array2::zeros((hidden_size, hidden_size)),
            why: Array2::zeros((vocab_size, hidden_size)),
            bh: Array1::zeros(hidden_size),
            by: Array1::zeros(vocab_size),
        }
    }

    /// All-zero tensors with the same shapes as `self`.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.vocab_size(), self.hidden_size())
    }

    pub fn vocab_size(&self) -> usize {
        self.by.len()
    }

    pub fn hidden_size(&self) -> usize {
        self.bh.len()
    }

    /// Check that all five tensors agree on `(vocab_size, hidden_size)`.
    pub fn check_shapes(&self, vocab_size: usize, hidden_size: usize) -> RnnResult<()> {
        let expected = [
            ("wxh", self.wxh.dim(), (hidden_size, vocab_size)),
            ("whh", self.whh.dim(), (hidden_size, hidden_size)),
            ("why", self.why.dim(), (vocab_size, hidden_size)),
            ("bh", (self.bh.len(), 1), (hidden_size, 1)),
            ("by", (self.by.len(), 1), (vocab_size, 1)),
        ];
        for (name, actual, want) in expected {
            if actual != want {
                return Err(RnnError::ShapeMismatch(format!(
                    "{name} has shape {actual:?}, expected {want:?}"
                )));
            }
        }
        Ok(())
    }

    /// Visit every element of `self` together with the matching elements of
    /// two other sets of the same shapes.
    ///
    /// Panics if the shapes differ; callers check with [`Params::check_shapes`].
    pub(crate) fn for_each_triple(
        &mut self,
        other: &Params,
        third: &mut Params,
        mut f: impl FnMut(&mut f64, f64, &mut f64),
    ) {
        macro_rules! zip_field {
            ($field:ident) => {
                Zip::from(&mut self.$field)
                    .and(&other.$field)
                    .and(&mut third.$field)
                    .for_each(|a, &b, c| f(a, b, c));
            };
        }
        zip_field!(wxh);
        zip_field!(whh);
        zip_field!(why);
        zip_field!(bh);
        zip_field!(by);
    }

    /// Advance the hidden state by one character.
    ///
    /// ```text
    /// h = tanh(Wxh[:, ix] + Whh h_prev + bh)
    /// ```
    ///
    /// Callers guarantee `ix < vocab_size` and `h_prev.len() == hidden_size`.
    #[must_use]
    pub fn step(&self, ix: usize, h_prev: &Array1<f64>) -> Array1<f64> {
        let mut h = self.whh.dot(h_prev);
        h += &self.wxh.column(ix);
        h += &self.bh;
        h.mapv_inplace(tanh);
        h
    }

    /// Unnormalized log-probabilities for the next character: `Why h + by`.
    #[must_use]
    pub fn logits(&self, h: &Array1<f64>) -> Array1<f64> {
        self.why.dot(h) + &self.by
    }

    /// Run the forward and backward passes over one window.
    ///
    /// # Algorithm
    ///
    /// Forward, for `t = 0..T`:
    /// ```text
    /// h_t = tanh(Wxh x_t + Whh h_{t-1} + bh)      (h_{-1} = h_init)
    /// p_t = softmax(Why h_t + by)
    /// L  += -log p_t[target_t]
    /// ```
    ///
    /// Backward, for `t = T-1..=0`, carrying `dh_next` (initially zero):
    /// ```text
    /// dy      = p_t - onehot(target_t)
    /// dWhy   += dy ⊗ h_t          dby += dy
    /// dh      = Whyᵀ dy + dh_next
    /// dh_raw  = (1 - h_t²) ⊙ dh
    /// dbh    += dh_raw
    /// dWxh   += dh_raw ⊗ x_t      dWhh += dh_raw ⊗ h_{t-1}
    /// dh_next = Whhᵀ dh_raw
    /// ```
    ///
    /// Every gradient is then clamped element-wise to `[-clip, clip]`.
    ///
    /// The per-timestep loss is computed as `logsumexp(y_t) - y_t[target]`,
    /// which equals `-log softmax(y_t)[target]` and never overflows.
    ///
    /// Pure with respect to `self`: no parameter is modified.
    ///
    /// # Errors
    /// - `ShapeMismatch` if the window is empty, inputs and targets differ in
    ///   length, or `h_init` is not `hidden_size` long
    /// - `IndexOutOfRange` if any index is outside the vocabulary
    pub fn loss_and_gradients(
        &self,
        inputs: &[usize],
        targets: &[usize],
        h_init: &Array1<f64>,
        clip: f64,
    ) -> RnnResult<ForwardBackward> {
        self.check_window(inputs, targets, h_init)?;

        let steps = inputs.len();
        let mut hs: Vec<Array1<f64>> = Vec::with_capacity(steps);
        let mut ps: Vec<Array1<f64>> = Vec::with_capacity(steps);
        let mut loss = 0.0;

        // Forward pass
        for t in 0..steps {
            let h_prev = if t == 0 { h_init } else { &hs[t - 1] };
            let h = self.step(inputs[t], h_prev);
            let y = self.logits(&h);

            let lse = log_sum_exp(&y);
            loss += lse - y[targets[t]];
            ps.push(y.mapv(|v| (v - lse).exp()));
            hs.push(h);
        }

        // Backward pass
        let mut grads = self.zeros_like();
        let mut dh_next = Array1::zeros(self.hidden_size());

        for t in (0..steps).rev() {
            let mut dy = ps[t].clone();
            dy[targets[t]] -= 1.0;

            grads.why += &outer(&dy, &hs[t]);
            grads.by += &dy;

            let dh = self.why.t().dot(&dy) + &dh_next;
            let dh_raw = hs[t].mapv(d_tanh_from_output) * &dh;

            grads.bh += &dh_raw;
            // dh_raw ⊗ x_t only touches the input's column.
            let mut column = grads.wxh.column_mut(inputs[t]);
            column += &dh_raw;

            let h_prev = if t == 0 { h_init } else { &hs[t - 1] };
            grads.whh += &outer(&dh_raw, h_prev);

            dh_next = self.whh.t().dot(&dh_raw);
        }

        // Clip to mitigate exploding gradients
        clip_inplace(&mut grads.wxh, clip);
        clip_inplace(&mut grads.whh, clip);
        clip_inplace(&mut grads.why, clip);
        clip_inplace(&mut grads.bh, clip);
        clip_inplace(&mut grads.by, clip);

        let h_last = hs.pop().unwrap_or_else(|| h_init.clone());

        Ok(ForwardBackward {
            loss,
            grads,
            h_last,
        })
    }

    fn check_window(
        &self,
        inputs: &[usize],
        targets: &[usize],
        h_init: &Array1<f64>,
    ) -> RnnResult<()> {
        if inputs.is_empty() {
            return Err(RnnError::ShapeMismatch("empty input window".to_string()));
        }
        if inputs.len() != targets.len() {
            return Err(RnnError::ShapeMismatch(format!(
                "{} inputs but {} targets",
                inputs.len(),
                targets.len()
            )));
        }
        if h_init.len() != self.hidden_size() {
            return Err(RnnError::ShapeMismatch(format!(
                "initial hidden state has length {}, expected {}",
                h_init.len(),
                self.hidden_size()
            )));
        }
        let size = self.vocab_size();
        if let Some(&index) = inputs.iter().chain(targets).find(|&&ix| ix >= size) {
            return Err(RnnError::IndexOutOfRange { index, size });
        }
        Ok(())
    }
}
