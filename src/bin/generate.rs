//! Text generation from a trained checkpoint.
//!
//! Loads a checkpoint, primes the hidden state with an optional prompt, and
//! prints sampled text to stdout.

use anyhow::{bail, Context, Result};
use char_rnn::sampling::{prime, sample_with_temperature};
use char_rnn::load_checkpoint;
use clap::Parser;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "char-rnn-generate", about = "Sample text from a trained char-rnn checkpoint")]
struct Args {
    /// Checkpoint file
    #[arg(long = "checkpoint-path", default_value = "rnn.tmp")]
    checkpoint: PathBuf,

    /// Number of characters to generate
    #[arg(long, default_value_t = 200)]
    length: usize,

    /// Prompt to condition on (default: first character of the corpus)
    #[arg(long)]
    prime: Option<String>,

    /// Sampling temperature (0 = always pick the most likely character)
    #[arg(long, default_value_t = 1.0)]
    temperature: f64,

    /// RNG seed (default: from the clock)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    eprintln!("Loading checkpoint: {}", args.checkpoint.display());
    let trainer = load_checkpoint(&args.checkpoint).context("Failed to load checkpoint")?;
    eprintln!(
        "  Iteration {}, smooth loss {:.4}, vocab {}",
        trainer.iteration,
        trainer.smooth_loss,
        trainer.vocab.size()
    );

    let prompt = match args.prime {
        Some(p) => p,
        None => trainer.corpus.chars().take(1).collect(),
    };
    let indices = trainer
        .vocab
        .encode(&prompt)
        .context("Prompt uses characters the model has never seen")?;
    let Some((&last, context)) = indices.split_last() else {
        bail!("Prompt must not be empty");
    };

    let h0 = Array1::zeros(trainer.params.hidden_size());
    let h = prime(&trainer.params, &h0, context)?;

    let seed = args.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });
    let mut rng = StdRng::seed_from_u64(seed);

    let sampled = sample_with_temperature(
        &trainer.params,
        &h,
        last,
        args.length,
        args.temperature,
        &mut rng,
    )?;
    let text = trainer.vocab.decode(&sampled)?;

    println!("{prompt}{text}");
    Ok(())
}
