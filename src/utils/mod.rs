//! Dense matrix helpers, activations, and numerics shared by the forward,
//! backward, and sampling passes.
//!
//! Matrices are `Array2<f64>` and vectors are `Array1<f64>`; `ndarray`
//! provides products (`dot`), transposes (`t()`), element-wise arithmetic,
//! maps (`mapv`), reductions (`sum`), and row/column views. The helpers here
//! cover what it does not ship directly.

use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Dimension, Ix1, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::StandardNormal;

/// Activation function: tanh.
#[inline]
pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// Derivative of tanh expressed through its output: `1 - tanh(x)²`.
#[inline]
pub fn d_tanh_from_output(y: f64) -> f64 {
    1.0 - y * y
}

/// Log of the sum of exponentials, computed with max-subtraction so that
/// large logits do not overflow.
pub fn log_sum_exp<S: Data<Elem = f64>>(y: &ArrayBase<S, Ix1>) -> f64 {
    let max = y.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = y.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Numerically stable softmax: `exp(y - max) / Σ exp(y - max)`.
pub fn softmax<S: Data<Elem = f64>>(y: &ArrayBase<S, Ix1>) -> Array1<f64> {
    let max = y.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp = y.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Outer product `a ⊗ b`, shape `(a.len(), b.len())`.
pub fn outer<S1, S2>(a: &ArrayBase<S1, Ix1>, b: &ArrayBase<S2, Ix1>) -> Array2<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
{
    // a[:, None] * b[None, :]
    let col = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    &col * &row
}

/// Clamp every element to `[-limit, limit]` in place.
pub fn clip_inplace<D: Dimension>(a: &mut Array<f64, D>, limit: f64) {
    a.mapv_inplace(|v| v.clamp(-limit, limit));
}

/// One-hot vector of length `size` with a 1 at `index`.
#[must_use]
pub fn one_hot(index: usize, size: usize) -> Array1<f64> {
    let mut v = Array1::zeros(size);
    v[index] = 1.0;
    v
}

/// Index of the largest element, or `None` for an empty vector.
pub fn argmax<S: Data<Elem = f64>>(v: &ArrayBase<S, Ix1>) -> Option<usize> {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

/// I.i.d. standard-normal entries scaled by `scale`.
pub fn randn<Sh, D, R>(shape: Sh, scale: f64, rng: &mut R) -> Array<f64, D>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    R: Rng + ?Sized,
{
    let a: Array<f64, D> = Array::random_using(shape, StandardNormal, rng);
    a * scale
}
