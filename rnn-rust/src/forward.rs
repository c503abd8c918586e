// ============================================================================
// FORWARD PASS
// ============================================================================

use crate::error::{Result, RnnError};
use crate::matrix::{argmax, softmax, vec_add_inplace, vec_tanh};
use crate::params::Params;

/// Activations of one forward pass; `states[t]` is `s_{t+1}` in 1-based notation.
pub struct Forward {
    pub states: Vec<Vec<f64>>,
    pub outputs: Vec<Vec<f64>>,
}

pub(crate) fn check_indices(what: &str, xs: &[usize], word_dim: usize) -> Result<()> {
    if let Some((t, &ix)) = xs.iter().enumerate().find(|&(_, &ix)| ix >= word_dim) {
        return Err(RnnError::ShapeMismatch(format!(
            "{} token {} at position {} is outside a vocabulary of {}",
            what, ix, t, word_dim
        )));
    }
    Ok(())
}

/// `s_t = tanh(U[:, x_t] + W s_{t-1})`, `o_t = softmax(V s_t)`, from `s_0 = 0`.
pub fn forward_propagation(params: &Params, xs: &[usize]) -> Result<Forward> {
    check_indices("input", xs, params.word_dim())?;
    let hs = params.hidden_dim();
    let mut states = Vec::with_capacity(xs.len());
    let mut outputs = Vec::with_capacity(xs.len());
    let mut prev = vec![0.0; hs];

    for &idx in xs {
        let mut pre = params.w.matvec(&prev);
        vec_add_inplace(&mut pre, &params.u.column(idx));
        let s = vec_tanh(&pre);
        outputs.push(softmax(&params.v.matvec(&s)));
        prev = s.clone();
        states.push(s);
    }

    Ok(Forward { states, outputs })
}

/// Greedy argmax per timestep. Diagnostics only; sampling draws instead.
pub fn predict(params: &Params, xs: &[usize]) -> Result<Vec<usize>> {
    let fwd = forward_propagation(params, xs)?;
    Ok(fwd.outputs.iter().map(|o| argmax(o)).collect())
}
