// ============================================================================
// LOSS + TRUNCATED BACKPROPAGATION THROUGH TIME
// For every output step `t` the error signal is pushed back through step `t`
// and at most `truncate` earlier steps. Anything older does not contribute to
// `dW` or to the recurrent share of `dU`. With `truncate >= T - 1` the result
// is the exact gradient.
// ============================================================================

use rayon::prelude::*;

use crate::corpus::Example;
use crate::error::{Result, RnnError};
use crate::forward::{check_indices, forward_propagation};
use crate::matrix::{vec_tanh_backward, Matrix};
use crate::params::{ParamName, Params};

pub const DEFAULT_BPTT_TRUNCATE: usize = 4;

/// Loss gradients, shaped like the parameters they belong to.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradients {
    pub du: Matrix,
    pub dv: Matrix,
    pub dw: Matrix,
}

impl Gradients {
    pub fn zeros_like(params: &Params) -> Self {
        Gradients {
            du: Matrix::zeros(params.u.rows, params.u.cols),
            dv: Matrix::zeros(params.v.rows, params.v.cols),
            dw: Matrix::zeros(params.w.rows, params.w.cols),
        }
    }

    pub fn get(&self, name: ParamName) -> &Matrix {
        match name {
            ParamName::U => &self.du,
            ParamName::V => &self.dv,
            ParamName::W => &self.dw,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.du.is_finite() && self.dv.is_finite() && self.dw.is_finite()
    }
}

fn check_pair(params: &Params, xs: &[usize], ys: &[usize]) -> Result<()> {
    if xs.len() != ys.len() {
        return Err(RnnError::ShapeMismatch(format!(
            "input has {} tokens but target has {}",
            xs.len(), ys.len()
        )));
    }
    check_indices("target", ys, params.word_dim())
}

/// `L = -sum_t ln o_t[y_t]`
pub fn ce_error(params: &Params, xs: &[usize], ys: &[usize]) -> Result<f64> {
    check_pair(params, xs, ys)?;
    let fwd = forward_propagation(params, xs)?;
    Ok(-fwd.outputs.iter().zip(ys).map(|(o, &y)| o[y].ln()).sum::<f64>())
}

/// Loss and gradients for one example.
pub fn bptt(params: &Params, xs: &[usize], ys: &[usize], truncate: usize) -> Result<(Gradients, f64)> {
    check_pair(params, xs, ys)?;
    let fwd = forward_propagation(params, xs)?;
    let mut grads = Gradients::zeros_like(params);
    let zero = vec![0.0; params.hidden_dim()];
    let mut loss = 0.0;

    for t in (0..xs.len()).rev() {
        // d(loss)/d(logits) = o_t - onehot(y_t)
        let mut delta_o = fwd.outputs[t].clone();
        loss -= delta_o[ys[t]].ln();
        delta_o[ys[t]] -= 1.0;
        grads.dv.add_outer(&delta_o, &fwd.states[t]);

        let mut delta_t = vec_tanh_backward(&params.v.matvec_t(&delta_o), &fwd.states[t]);
        let start = t.saturating_sub(truncate);
        for step in (start..=t).rev() {
            let prev = if step == 0 { &zero } else { &fwd.states[step - 1] };
            grads.dw.add_outer(&delta_t, prev);
            grads.du.add_to_column(xs[step], &delta_t);
            if step > start {
                delta_t = vec_tanh_backward(&params.w.matvec_t(&delta_t), prev);
            }
        }
    }

    Ok((grads, loss))
}

/// Sum of per-example losses. Examples are scored in parallel; the sum runs in corpus order.
pub fn total_loss(params: &Params, examples: &[Example]) -> Result<f64> {
    let losses: Vec<f64> = examples
        .par_iter()
        .map(|ex| ce_error(params, &ex.x, &ex.y))
        .collect::<Result<_>>()?;
    Ok(losses.iter().sum())
}

/// Total loss per target token. An empty corpus divides by zero and yields NaN.
pub fn mean_loss(params: &Params, examples: &[Example]) -> Result<f64> {
    let num_words: usize = examples.iter().map(Example::len).sum();
    Ok(total_loss(params, examples)? / num_words as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(word: usize, hidden: usize, seed: u64) -> Params {
        let mut rng = StdRng::seed_from_u64(seed);
        Params::new(word, hidden, &mut rng)
    }

    #[test]
    fn bptt_loss_matches_ce_error() {
        let p = params(6, 4, 3);
        let (xs, ys) = ([0, 1, 2, 3], [1, 2, 3, 5]);
        let (_, loss) = bptt(&p, &xs, &ys, 4).expect("bptt");
        let ce = ce_error(&p, &xs, &ys).expect("ce");
        assert!((loss - ce).abs() < 1e-12);
        assert!(loss > 0.0);
    }

    #[test]
    fn truncation_is_noop_at_or_above_sequence_length() {
        let p = params(7, 5, 11);
        let xs = [0, 4, 2, 6, 1, 1, 3, 5];
        let ys = [4, 2, 6, 1, 1, 3, 5, 0];
        let (exact, _) = bptt(&p, &xs, &ys, 1000).expect("bptt");
        let (at_len, _) = bptt(&p, &xs, &ys, xs.len()).expect("bptt");
        assert_eq!(exact, at_len);
    }

    #[test]
    fn short_truncation_only_changes_recurrent_paths() {
        let p = params(7, 5, 11);
        let xs = [0, 4, 2, 6, 1, 1, 3, 5];
        let ys = [4, 2, 6, 1, 1, 3, 5, 0];
        let (exact, _) = bptt(&p, &xs, &ys, 1000).expect("bptt");
        let (short, _) = bptt(&p, &xs, &ys, 1).expect("bptt");
        assert_eq!(exact.dv, short.dv);
        assert_ne!(exact.dw, short.dw);
    }

    #[test]
    fn unused_input_columns_get_no_gradient() {
        let p = params(6, 3, 5);
        let (g, _) = bptt(&p, &[0, 1], &[1, 2], 4).expect("bptt");
        for c in 2..6 {
            assert!(g.du.column(c).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let p = params(4, 2, 0);
        assert!(matches!(bptt(&p, &[0, 1], &[1], 4), Err(RnnError::ShapeMismatch(_))));
        assert!(matches!(ce_error(&p, &[0], &[9]), Err(RnnError::ShapeMismatch(_))));
    }

    #[test]
    fn mean_loss_divides_by_token_count() {
        let p = params(5, 3, 9);
        let examples = vec![
            Example::new(vec![0, 1, 2], vec![1, 2, 3]).expect("example"),
            Example::new(vec![3], vec![4]).expect("example"),
        ];
        let total = total_loss(&p, &examples).expect("total");
        let mean = mean_loss(&p, &examples).expect("mean");
        assert!((mean - total / 4.0).abs() < 1e-12);
        assert!(mean_loss(&p, &[]).expect("mean").is_nan());
    }
}
