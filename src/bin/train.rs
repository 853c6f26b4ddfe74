//! Character-level RNN training binary.
//!
//! Resumes from the checkpoint file when it exists, otherwise builds a fresh
//! network from the input corpus. Logs sampled text and smoothed loss to
//! stderr, optionally appends JSONL metrics, and saves a final checkpoint when
//! the iteration budget is reached.

use anyhow::{Context, Result};
use char_rnn::{load_corpus, save_checkpoint, try_load_checkpoint, Config, TrainEvent, Trainer};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(
    name = "char-rnn-train",
    about = "Train a character-level RNN with BPTT and Adagrad"
)]
struct Args {
    /// Checkpoint file: resumed from if present, written periodically
    #[arg(long = "checkpoint-path", default_value = "rnn.tmp")]
    checkpoint: PathBuf,

    /// Training corpus (plain text)
    #[arg(long = "input-path", default_value = "input.txt")]
    input: PathBuf,

    /// Stop once this many iterations have completed
    #[arg(long, default_value_t = 1_000_000)]
    max_iterations: usize,

    /// RNG seed for initialization and sampling (default: from the clock)
    #[arg(long)]
    seed: Option<u64>,

    /// Hidden layer size (fresh runs only)
    #[arg(long, default_value_t = 100)]
    hidden_size: usize,

    /// BPTT window length (fresh runs only)
    #[arg(long, default_value_t = 25)]
    seq_length: usize,

    /// Adagrad learning rate (fresh runs only)
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Append JSONL progress events to this file
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn open_metrics(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create metrics output directory")?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open metrics file {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(clock_seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut trainer = match try_load_checkpoint(&args.checkpoint).with_context(|| {
        format!(
            "Unable to restore RNN from checkpoint file {}",
            args.checkpoint.display()
        )
    })? {
        Some(trainer) => {
            eprintln!("Resumed from checkpoint: {}", args.checkpoint.display());
            eprintln!(
                "  Iteration {}, smooth loss {:.4}",
                trainer.iteration, trainer.smooth_loss
            );
            trainer
        }
        None => {
            let corpus = load_corpus(&args.input).context("Error reading input training file")?;
            let config = Config {
                hidden_size: args.hidden_size,
                seq_length: args.seq_length,
                learning_rate: args.learning_rate,
                ..Config::default()
            };
            Trainer::new(corpus, config, &mut rng).context("Unable to start training")?
        }
    };

    eprintln!("Char-RNN Training");
    eprintln!(
        "  Network: vocab={}, hidden={}",
        trainer.vocab.size(),
        trainer.config.hidden_size
    );
    eprintln!(
        "  Window: {} chars, corpus: {} chars",
        trainer.config.seq_length,
        trainer.corpus.chars().count()
    );
    eprintln!(
        "  Learning rate: {}, clip: {}",
        trainer.config.learning_rate, trainer.config.grad_clip
    );
    eprintln!("  Seed: {seed}");
    eprintln!("  Checkpoint: {}", args.checkpoint.display());
    eprintln!();

    let metrics = args.metrics_file.as_deref().map(open_metrics).transpose()?;
    train_session(
        &mut trainer,
        &args.checkpoint,
        args.max_iterations,
        &mut rng,
        metrics,
    )
}

fn event_record(event: &TrainEvent) -> serde_json::Value {
    match event {
        TrainEvent::Sample {
            iteration,
            smooth_loss,
            text,
        } => {
            eprintln!("----\n{text}\n----");
            eprintln!("iter {iteration}, loss: {smooth_loss:.6}");
            serde_json::json!({
                "type": "sample",
                "iteration": iteration,
                "smooth_loss": smooth_loss,
                "text": text,
            })
        }
        TrainEvent::Checkpoint { iteration, path } => {
            eprintln!("Saved checkpoint at iter {iteration} to {}", path.display());
            serde_json::json!({
                "type": "checkpoint",
                "iteration": iteration,
                "path": path.display().to_string(),
            })
        }
    }
}

/// Train up to `max_iterations`, then save the final checkpoint.
///
/// The first metrics write failure closes the metrics sink and is reported
/// only after the final checkpoint is on disk.
fn train_session<W: Write>(
    trainer: &mut Trainer,
    checkpoint: &Path,
    max_iterations: usize,
    rng: &mut StdRng,
    mut metrics: Option<W>,
) -> Result<()> {
    let mut metrics_error = None;
    trainer.run(max_iterations, Some(checkpoint), rng, |event| {
        let record = event_record(event);
        if let Some(sink) = metrics.as_mut() {
            if let Err(e) = writeln!(sink, "{record}").and_then(|()| sink.flush()) {
                eprintln!("Metrics disabled after write failure: {e}");
                metrics_error = Some(e);
                metrics = None;
            }
        }
    })?;

    save_checkpoint(trainer, checkpoint).context("Unable to save checkpoint file")?;
    eprintln!(
        "Done: {} iterations, smooth loss {:.4}. Saved {}",
        trainer.iteration,
        trainer.smooth_loss,
        checkpoint.display()
    );

    match metrics_error {
        Some(e) => Err(e).context("Failed to write metrics"),
        None => Ok(()),
    }
}
