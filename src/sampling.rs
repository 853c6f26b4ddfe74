//! Autoregressive text sampling from a trained parameter set.
//!
//! Each step advances a local copy of the hidden state, turns the output
//! logits into a categorical distribution, and draws the next index with
//! Walker's alias method (`O(1)` per draw once the table is built). The
//! drawn index is fed back as the next input.

use ndarray::Array1;
use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::WeightedAliasIndex;

use crate::core::{Params, RnnError, RnnResult};
use crate::utils::{argmax, softmax};

/// Sample `count` indices starting from hidden state `h` and character `seed_ix`.
///
/// Equivalent to [`sample_with_temperature`] at temperature 1.
///
/// # Errors
/// See [`sample_with_temperature`].
pub fn sample<R: Rng + ?Sized>(
    params: &Params,
    h: &Array1<f64>,
    seed_ix: usize,
    count: usize,
    rng: &mut R,
) -> RnnResult<Vec<usize>> {
    sample_with_temperature(params, h, seed_ix, count, 1.0, rng)
}

/// Sample `count` indices with logits divided by `temperature` before softmax.
///
/// Lower temperatures sharpen the distribution; a temperature of zero picks
/// the most likely character at every step. `h` is not modified.
///
/// # Errors
/// - `InvalidConfig` for a negative or non-finite temperature
/// - `ShapeMismatch` if `h` is not `hidden_size` long
/// - `IndexOutOfRange` if `seed_ix` is outside the vocabulary
/// - `Sampling` if the distribution is degenerate (e.g. NaN weights)
pub fn sample_with_temperature<R: Rng + ?Sized>(
    params: &Params,
    h: &Array1<f64>,
    seed_ix: usize,
    count: usize,
    temperature: f64,
    rng: &mut R,
) -> RnnResult<Vec<usize>> {
    if !(temperature.is_finite() && temperature >= 0.0) {
        return Err(RnnError::InvalidConfig(format!(
            "temperature must be finite and >= 0, got {temperature}"
        )));
    }
    check_seed(params, h, seed_ix)?;

    let mut h = h.clone();
    let mut ix = seed_ix;
    let mut out = Vec::with_capacity(count);

    for _ in 0..count {
        h = params.step(ix, &h);
        let y = params.logits(&h);

        ix = if temperature == 0.0 {
            argmax(&y).ok_or_else(|| RnnError::Sampling("empty distribution".to_string()))?
        } else {
            let p = softmax(&(y / temperature));
            draw(&p, rng)?
        };
        out.push(ix);
    }

    Ok(out)
}

/// Advance `h` through a sequence of indices, returning the final hidden state.
///
/// Used to condition sampling on a prompt.
///
/// # Errors
/// - `ShapeMismatch` if `h` is not `hidden_size` long
/// - `IndexOutOfRange` for any index outside the vocabulary
pub fn prime(params: &Params, h: &Array1<f64>, indices: &[usize]) -> RnnResult<Array1<f64>> {
    let mut h = h.clone();
    for &ix in indices {
        check_seed(params, &h, ix)?;
        h = params.step(ix, &h);
    }
    Ok(h)
}

/// Draw one index from the categorical distribution `p`.
fn draw<R: Rng + ?Sized>(p: &Array1<f64>, rng: &mut R) -> RnnResult<usize> {
    let table =
        WeightedAliasIndex::new(p.to_vec()).map_err(|e| RnnError::Sampling(e.to_string()))?;
    Ok(table.sample(rng))
}

fn check_seed(params: &Params, h: &Array1<f64>, ix: usize) -> RnnResult<()> {
    if h.len() != params.hidden_size() {
        return Err(RnnError::ShapeMismatch(format!(
            "hidden state has length {}, expected {}",
            h.len(),
            params.hidden_size()
        )));
    }
    if ix >= params.vocab_size() {
        return Err(RnnError::IndexOutOfRange {
            index: ix,
            size: params.vocab_size(),
        });
    }
    Ok(())
}
