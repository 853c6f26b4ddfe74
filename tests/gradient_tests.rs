//! Forward/backward pass properties.
//!
//! These tests verify:
//! - Analytic gradients agree with central finite differences
//! - Every returned gradient lies within the clipping bound
//! - Cross-entropy loss is never negative
//! - The pass is deterministic and leaves the parameters untouched

use approx::assert_abs_diff_eq;
use char_rnn::Params;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const VOCAB: usize = 4;
const HIDDEN: usize = 6;

fn make_params(seed: u64, scale: f64) -> Params {
    let mut rng = StdRng::seed_from_u64(seed);
    Params::new(VOCAB, HIDDEN, scale, &mut rng).expect("valid dims")
}

fn window() -> (Vec<usize>, Vec<usize>, Array1<f64>) {
    let inputs = vec![0, 2, 1, 3, 3, 0];
    let targets = vec![2, 1, 3, 3, 0, 1];
    let h_init = Array1::from_iter((0..HIDDEN).map(|i| 0.1 * i as f64 - 0.2));
    (inputs, targets, h_init)
}

fn loss_of(params: &Params) -> f64 {
    let (inputs, targets, h_init) = window();
    params
        .loss_and_gradients(&inputs, &targets, &h_init, 1e9)
        .expect("valid window")
        .loss
}

/// Compare one analytic gradient entry against `(L(θ+δ) - L(θ-δ)) / 2δ`.
fn check_entry(params: &Params, analytic: f64, select: impl Fn(&mut Params) -> &mut f64) {
    let delta = 1e-5;
    let mut plus = params.clone();
    *select(&mut plus) += delta;
    let mut minus = params.clone();
    *select(&mut minus) -= delta;
    let numeric = (loss_of(&plus) - loss_of(&minus)) / (2.0 * delta);
    assert_abs_diff_eq!(analytic, numeric, epsilon = 1e-6);
}

#[test]
fn test_gradients_match_finite_differences() {
    // Larger weights than the default so every gradient is comfortably non-zero
    let mut params = make_params(13, 0.5);
    params.bh.fill(0.05);
    params.by.fill(-0.1);

    let (inputs, targets, h_init) = window();
    let grads = params
        .loss_and_gradients(&inputs, &targets, &h_init, 1e9)
        .expect("valid window")
        .grads;

    for i in 0..HIDDEN {
        for j in 0..VOCAB {
            check_entry(&params, grads.wxh[[i, j]], |p| &mut p.wxh[[i, j]]);
            check_entry(&params, grads.why[[j, i]], |p| &mut p.why[[j, i]]);
        }
        for j in 0..HIDDEN {
            check_entry(&params, grads.whh[[i, j]], |p| &mut p.whh[[i, j]]);
        }
        check_entry(&params, grads.bh[i], |p| &mut p.bh[i]);
    }
    for j in 0..VOCAB {
        check_entry(&params, grads.by[j], |p| &mut p.by[j]);
    }
}

#[test]
fn test_unused_input_columns_have_zero_gradient() {
    let params = make_params(3, 0.1);
    let out = params
        .loss_and_gradients(&[0, 0, 1], &[1, 0, 0], &Array1::zeros(HIDDEN), 5.0)
        .expect("valid window");
    assert!(out.grads.wxh.column(2).iter().all(|&v| v == 0.0));
    assert!(out.grads.wxh.column(3).iter().all(|&v| v == 0.0));
    assert!(out.grads.wxh.column(0).iter().any(|&v| v != 0.0));
}

#[test]
fn test_gradient_clipping_bound() {
    let mut rng = StdRng::seed_from_u64(99);
    for trial in 0..20 {
        // Large weights push raw gradients well past the bound
        let params = make_params(trial, 3.0);
        let len = rng.gen_range(1..30);
        let inputs: Vec<usize> = (0..len).map(|_| rng.gen_range(0..VOCAB)).collect();
        let targets: Vec<usize> = (0..len).map(|_| rng.gen_range(0..VOCAB)).collect();

        let out = params
            .loss_and_gradients(&inputs, &targets, &Array1::zeros(HIDDEN), 5.0)
            .expect("valid window");
        let g = &out.grads;
        let all = g
            .wxh
            .iter()
            .chain(g.whh.iter())
            .chain(g.why.iter())
            .chain(g.bh.iter())
            .chain(g.by.iter());
        for &v in all {
            assert!((-5.0..=5.0).contains(&v), "gradient {v} escaped [-5, 5]");
        }
    }
}

#[test]
fn test_loss_non_negative() {
    let mut rng = StdRng::seed_from_u64(21);
    for trial in 0..20 {
        let scale = [0.01, 1.0, 20.0][trial % 3];
        let params = make_params(trial as u64, scale);
        let len = rng.gen_range(1..40);
        let inputs: Vec<usize> = (0..len).map(|_| rng.gen_range(0..VOCAB)).collect();
        let targets: Vec<usize> = (0..len).map(|_| rng.gen_range(0..VOCAB)).collect();

        let out = params
            .loss_and_gradients(&inputs, &targets, &Array1::zeros(HIDDEN), 5.0)
            .expect("valid window");
        assert!(out.loss >= 0.0 && out.loss.is_finite(), "loss {}", out.loss);
    }
}

#[test]
fn test_forward_backward_deterministic() {
    let params = make_params(1, 0.3);
    let before = params.clone();
    let (inputs, targets, h_init) = window();

    let a = params
        .loss_and_gradients(&inputs, &targets, &h_init, 5.0)
        .expect("valid window");
    let b = params
        .loss_and_gradients(&inputs, &targets, &h_init, 5.0)
        .expect("valid window");

    assert_eq!(a.loss.to_bits(), b.loss.to_bits());
    assert_eq!(a, b);
    assert_eq!(params, before);
}

#[test]
fn test_h_last_is_final_recurrence_state() {
    let params = make_params(2, 0.3);
    let (inputs, targets, h_init) = window();
    let out = params
        .loss_and_gradients(&inputs, &targets, &h_init, 5.0)
        .expect("valid window");

    let h = inputs
        .iter()
        .fold(h_init.clone(), |h, &ix| params.step(ix, &h));
    assert_eq!(out.h_last, h);
    assert!(out.h_last.iter().all(|v| v.abs() < 1.0));
}
