//! Training loop and optimizer.
//!
//! The [`Trainer`] owns every piece of mutable training state: parameters,
//! Adagrad accumulators, the carried hidden state, the corpus cursor, the
//! iteration counter and the loss bookkeeping. Each iteration runs strictly
//! in order:
//!
//! 1. Window preparation (reset to the start of the corpus when needed)
//! 2. Forward/backward pass, then the Adagrad update
//! 3. Periodic side effects: sampling and checkpointing

pub mod adagrad;

pub use adagrad::Adagrad;

use ndarray::Array1;
use rand::Rng;
use std::path::{Path, PathBuf};

use crate::checkpoint::save_checkpoint;
use crate::core::{Params, RnnError, RnnResult};
use crate::data::{check_corpus_len, Vocabulary};
use crate::sampling::sample;
use crate::Config;

/// Progress reported by [`Trainer::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrainEvent {
    /// Text sampled from the current parameters.
    Sample {
        iteration: usize,
        smooth_loss: f64,
        text: String,
    },
    /// A checkpoint was written.
    Checkpoint { iteration: usize, path: PathBuf },
}

/// Complete resumable training state for one corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Trainer {
    pub config: Config,
    pub vocab: Vocabulary,
    pub params: Params,
    pub optimizer: Adagrad,
    /// Raw training text, immutable after construction.
    pub corpus: String,
    /// Corpus as vocabulary indices.
    data: Vec<usize>,
    /// Completed iterations.
    pub iteration: usize,
    /// Loss of the most recent window.
    pub loss: f64,
    /// Exponential moving average of the window loss.
    pub smooth_loss: f64,
    /// Hidden state carried from the previous window.
    pub hprev: Array1<f64>,
    /// Start of the next window, in code points.
    pub cursor: usize,
}

/// Loss of a model that predicts uniformly over the vocabulary, per window.
fn initial_smooth_loss(vocab_size: usize, seq_length: usize) -> f64 {
    -(1.0 / vocab_size as f64).ln() * seq_length as f64
}

impl Trainer {
    /// Build fresh training state from a corpus.
    ///
    /// The corpus is validated before anything is allocated.
    ///
    /// # Errors
    /// - `InvalidConfig` if `config` is invalid
    /// - `EmptyCorpus` / `CorpusTooShort` if the corpus is shorter than
    ///   [`Config::min_corpus_len`]
    pub fn new<R: Rng + ?Sized>(corpus: String, config: Config, rng: &mut R) -> RnnResult<Self> {
        config.validate()?;
        check_corpus_len(&corpus, config.min_corpus_len())?;

        let vocab = Vocabulary::from_text(&corpus);
        let data = vocab.encode(&corpus)?;
        let params = Params::new(vocab.size(), config.hidden_size, config.init_scale, rng)?;
        let optimizer = Adagrad::new(&params, config.learning_rate, config.adagrad_epsilon);
        let smooth_loss = initial_smooth_loss(vocab.size(), config.seq_length);
        let hprev = Array1::zeros(config.hidden_size);

        Ok(Self {
            config,
            vocab,
            params,
            optimizer,
            corpus,
            data,
            iteration: 0,
            loss: 0.0,
            smooth_loss,
            hprev,
            cursor: 0,
        })
    }

    /// Reassemble training state from its persisted parts, checking that
    /// every piece is consistent with the others.
    ///
    /// # Errors
    /// - `InvalidConfig` if `config` is invalid
    /// - `ShapeMismatch` if tensors disagree with `(vocab, hidden_size)`
    /// - `UnknownCharacter` if the corpus uses characters outside `vocab`
    /// - `CorpusTooShort` / `EmptyCorpus` for a corpus that cannot be trained on
    /// - `Checkpoint` if the cursor lies outside the corpus
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        config: Config,
        vocab: Vocabulary,
        params: Params,
        memory: Params,
        corpus: String,
        iteration: usize,
        loss: f64,
        smooth_loss: f64,
        hprev: Array1<f64>,
        cursor: usize,
    ) -> RnnResult<Self> {
        config.validate()?;
        let len = check_corpus_len(&corpus, config.min_corpus_len())?;
        params.check_shapes(vocab.size(), config.hidden_size)?;
        memory.check_shapes(vocab.size(), config.hidden_size)?;
        if hprev.len() != config.hidden_size {
            return Err(RnnError::ShapeMismatch(format!(
                "hidden state has length {}, expected {}",
                hprev.len(),
                config.hidden_size
            )));
        }
        if cursor > len {
            return Err(RnnError::Checkpoint(format!(
                "cursor {cursor} is past the end of a {len}-character corpus"
            )));
        }
        let data = vocab.encode(&corpus)?;

        let optimizer = Adagrad {
            memory,
            learning_rate: config.learning_rate,
            epsilon: config.adagrad_epsilon,
        };

        Ok(Self {
            config,
            vocab,
            params,
            optimizer,
            corpus,
            data,
            iteration,
            loss,
            smooth_loss,
            hprev,
            cursor,
        })
    }

    /// Input and target indices of the next window, resetting to the start of
    /// the corpus (with a zeroed hidden state) on the first iteration or when
    /// the window would run past the end.
    fn prepare_window(&mut self) -> (Vec<usize>, Vec<usize>) {
        let seq_length = self.config.seq_length;
        if self.iteration == 0 || self.cursor + seq_length + 1 >= self.data.len() {
            self.hprev = Array1::zeros(self.config.hidden_size);
            self.cursor = 0;
        }

        let start = self.cursor;
        // The corpus holds at least seq_length + 1 characters.
        let end = (start + seq_length).min(self.data.len() - 1);
        let inputs = self.data[start..end].to_vec();
        let targets = self.data[start + 1..end + 1].to_vec();
        (inputs, targets)
    }

    /// Run one training iteration without sampling or checkpointing.
    ///
    /// Returns the last target index of the window, which seeds sampling.
    ///
    /// # Errors
    /// Propagates shape errors from the forward/backward pass or the update.
    pub fn step(&mut self) -> RnnResult<usize> {
        let (inputs, targets) = self.prepare_window();

        let out = self.params.loss_and_gradients(
            &inputs,
            &targets,
            &self.hprev,
            self.config.grad_clip,
        )?;

        self.loss = out.loss;
        let weight = self.config.loss_weight;
        self.smooth_loss = self.smooth_loss * (1.0 - weight) + out.loss * weight;
        self.hprev = out.h_last;

        self.optimizer.update(&mut self.params, &out.grads)?;

        self.cursor += inputs.len();
        self.iteration += 1;

        Ok(targets[targets.len() - 1])
    }

    /// Generate `count` characters from the current state without changing it.
    ///
    /// # Errors
    /// Propagates sampler errors.
    pub fn sample_text<R: Rng + ?Sized>(
        &self,
        seed_ix: usize,
        count: usize,
        rng: &mut R,
    ) -> RnnResult<String> {
        let indices = sample(&self.params, &self.hprev, seed_ix, count, rng)?;
        self.vocab.decode(&indices)
    }

    /// Train until `max_iterations` iterations have completed.
    ///
    /// Every `sample_every` iterations a [`TrainEvent::Sample`] is reported;
    /// every `checkpoint_every` iterations the state is saved to `checkpoint`
    /// (when given) and a [`TrainEvent::Checkpoint`] is reported.
    ///
    /// # Errors
    ///
    /// Any error stops training, including a failed checkpoint write: a run
    /// that cannot persist its progress does not continue.
    pub fn run<R, F>(
        &mut self,
        max_iterations: usize,
        checkpoint: Option<&Path>,
        rng: &mut R,
        mut on_event: F,
    ) -> RnnResult<()>
    where
        R: Rng + ?Sized,
        F: FnMut(&TrainEvent),
    {
        while self.iteration < max_iterations {
            let seed_ix = self.step()?;

            if self.iteration % self.config.sample_every == 0 {
                let text = self.sample_text(seed_ix, self.config.sample_len, rng)?;
                on_event(&TrainEvent::Sample {
                    iteration: self.iteration,
                    smooth_loss: self.smooth_loss,
                    text,
                });
            }

            if let Some(path) = checkpoint {
                if self.iteration % self.config.checkpoint_every == 0 {
                    save_checkpoint(self, path)?;
                    on_event(&TrainEvent::Checkpoint {
                        iteration: self.iteration,
                        path: path.to_path_buf(),
                    });
                }
            }
        }
        Ok(())
    }
}
