//! End-to-end training tests.
//!
//! These tests verify:
//! - Training on a small corpus advances the iteration counter and keeps the loss sane
//! - Short corpora are rejected before any parameter is allocated
//! - Save, reload and continue gives exactly the same state as never stopping
//! - Periodic checkpoints are written by the training loop

use approx::assert_abs_diff_eq;
use char_rnn::{
    load_checkpoint, save_checkpoint, Config, RnnError, TrainEvent, Trainer, Vocabulary,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::PathBuf;

fn mary_corpus() -> String {
    "mary had a little lamb ".repeat(10)
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn test_mary_had_a_little_lamb() {
    let corpus = mary_corpus();
    assert!(corpus.chars().count() >= 200);

    let vocab = Vocabulary::from_text(&corpus);
    let expected = ['m', 'a', 'r', 'y', ' ', 'h', 'd', 'l', 'i', 't', 'e', 'b'];
    assert_eq!(vocab.size(), 12);
    for (i, &c) in expected.iter().enumerate() {
        assert_eq!(vocab.char_to_index(c), Some(i));
    }

    let mut rng = StdRng::seed_from_u64(2024);
    let mut trainer = Trainer::new(corpus, Config::default(), &mut rng).expect("valid corpus");
    assert_eq!(trainer.vocab, vocab);

    trainer
        .run(10, None, &mut rng, |_| {})
        .expect("training succeeds");
    assert_eq!(trainer.iteration, 10);
    assert!(trainer.loss >= 0.0);
    assert!(trainer.smooth_loss.is_finite());

    let dir = temp_dir("char_rnn_test_mary");
    let path = dir.join("rnn.tmp");
    save_checkpoint(&trainer, &path).expect("save");
    let restored = load_checkpoint(&path).expect("load");

    assert_eq!(restored.iteration, 10);
    assert_eq!(restored.params, trainer.params);
    assert_eq!(restored.optimizer.memory, trainer.optimizer.memory);
    assert_eq!(restored, trainer);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_short_corpus_rejected() {
    let mut rng = StdRng::seed_from_u64(1);
    let result = Trainer::new(
        "mary had a little lamb".to_string(),
        Config::default(),
        &mut rng,
    );
    assert_eq!(result, Err(RnnError::CorpusTooShort { len: 22, min: 200 }));
}

#[test]
fn test_empty_corpus_rejected() {
    let mut rng = StdRng::seed_from_u64(1);
    let result = Trainer::new(String::new(), Config::default(), &mut rng);
    assert_eq!(result, Err(RnnError::EmptyCorpus));
}

#[test]
fn test_resume_matches_uninterrupted_run() {
    let config = Config {
        hidden_size: 32,
        sample_every: 1000,
        ..Config::default()
    };
    let mut rng = StdRng::seed_from_u64(77);
    let mut uninterrupted =
        Trainer::new(mary_corpus(), config, &mut rng).expect("valid corpus");
    let mut resumed = uninterrupted.clone();

    uninterrupted
        .run(25, None, &mut rng, |_| {})
        .expect("training succeeds");

    let dir = temp_dir("char_rnn_test_resume");
    let path = dir.join("rnn.tmp");
    resumed.run(12, None, &mut rng, |_| {}).expect("first half");
    save_checkpoint(&resumed, &path).expect("save");
    drop(resumed);

    let mut resumed = load_checkpoint(&path).expect("load");
    resumed.run(25, None, &mut rng, |_| {}).expect("second half");

    // Windows wrap at least once in 25 iterations over 230 characters.
    assert_eq!(resumed, uninterrupted);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_loss_decreases_on_repetitive_text() {
    let config = Config {
        hidden_size: 32,
        sample_every: 1000,
        ..Config::default()
    };
    let mut rng = StdRng::seed_from_u64(5);
    let mut trainer = Trainer::new(mary_corpus(), config, &mut rng).expect("valid corpus");
    let initial = trainer.smooth_loss;
    assert_abs_diff_eq!(initial, 25.0 * 12f64.ln(), epsilon = 1e-9);

    trainer.run(300, None, &mut rng, |_| {}).expect("training");
    assert!(
        trainer.loss < initial,
        "window loss {} should fall below the uniform baseline {}",
        trainer.loss,
        initial
    );
}

#[test]
fn test_periodic_checkpoints_written() {
    let config = Config {
        hidden_size: 16,
        sample_every: 5,
        checkpoint_every: 10,
        ..Config::default()
    };
    let dir = temp_dir("char_rnn_test_periodic");
    let path = dir.join("nested").join("rnn.tmp");

    let mut rng = StdRng::seed_from_u64(8);
    let mut trainer = Trainer::new(mary_corpus(), config, &mut rng).expect("valid corpus");

    let mut samples = 0;
    let mut checkpoints = Vec::new();
    trainer
        .run(20, Some(path.as_path()), &mut rng, |event| match event {
            TrainEvent::Sample { text, .. } => {
                assert_eq!(text.chars().count(), 200);
                samples += 1;
            }
            TrainEvent::Checkpoint { iteration, .. } => checkpoints.push(*iteration),
        })
        .expect("training succeeds");

    assert_eq!(samples, 4);
    assert_eq!(checkpoints, vec![10, 20]);

    let restored = load_checkpoint(&path).expect("load");
    assert_eq!(restored, trainer);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_checkpoint_write_failure_stops_training() {
    let dir = temp_dir("char_rnn_test_unwritable");
    // A directory where the checkpoint file should be makes the rename fail.
    let path = dir.join("rnn.tmp");
    fs::create_dir_all(path.join("occupied")).expect("create blocker");

    let config = Config {
        hidden_size: 8,
        checkpoint_every: 3,
        sample_every: 1000,
        ..Config::default()
    };
    let mut rng = StdRng::seed_from_u64(8);
    let mut trainer = Trainer::new(mary_corpus(), config, &mut rng).expect("valid corpus");

    let result = trainer.run(10, Some(path.as_path()), &mut rng, |_| {});
    assert!(matches!(result, Err(RnnError::Io(_))));
    assert_eq!(trainer.iteration, 3);

    let _ = fs::remove_dir_all(&dir);
}
