// ============================================================================
// GRADIENT CHECK
// Centered finite differences against the analytic gradient. Two loss
// evaluations per scalar parameter: small models only.
// ============================================================================

use tracing::{error, info};

use crate::error::Result;
use crate::model::Rnn;
use crate::params::ParamName;

/// Large enough that no realistic sequence is truncated.
pub const EXACT_BPTT_TRUNCATE: usize = 1000;
pub const DEFAULT_H: f64 = 0.001;
pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct GradCheckFailure {
    pub parameter: ParamName,
    pub index: (usize, usize),
    pub loss_plus: f64,
    pub loss_minus: f64,
    pub estimated: f64,
    pub backprop: f64,
    pub relative_error: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GradCheckReport {
    Passed,
    Failed(GradCheckFailure),
}

impl GradCheckReport {
    pub fn passed(&self) -> bool { matches!(self, GradCheckReport::Passed) }
}

/// `|a - e| / (|a| + |e|)`, taken as 0 when both are exactly 0.
pub fn relative_error(analytic: f64, estimated: f64) -> f64 {
    let denom = analytic.abs() + estimated.abs();
    if denom == 0.0 { 0.0 } else { (analytic - estimated).abs() / denom }
}

/// Stops at the first entry whose relative error exceeds `error_threshold`.
/// Leaves `rnn.bptt_truncate` at [`EXACT_BPTT_TRUNCATE`]; weights are restored.
pub fn gradient_check(rnn: &mut Rnn, xs: &[usize], ys: &[usize], h: f64, error_threshold: f64) -> Result<GradCheckReport> {
    rnn.bptt_truncate = EXACT_BPTT_TRUNCATE;
    let grads = rnn.bptt(xs, ys)?;

    for name in ParamName::ALL {
        let (rows, cols) = rnn.params.get(name).shape();
        info!("Performing gradient check for parameter {} with size {}.", name, rows * cols);

        for ix in 0..rows * cols {
            let original = rnn.params.get(name).data[ix];
            rnn.params.get_mut(name).data[ix] = original + h;
            let loss_plus = rnn.ce_error(xs, ys);
            rnn.params.get_mut(name).data[ix] = original - h;
            let loss_minus = rnn.ce_error(xs, ys);
            rnn.params.get_mut(name).data[ix] = original;
            let (loss_plus, loss_minus) = (loss_plus?, loss_minus?);

            let estimated = (loss_plus - loss_minus) / (2.0 * h);
            let backprop = grads.get(name).data[ix];
            let rel = relative_error(backprop, estimated);
            if rel > error_threshold {
                let index = (ix / cols, ix % cols);
                error!("Gradient Check ERROR: parameter={} ix={:?}", name, index);
                error!("+h Loss: {:.6}", loss_plus);
                error!("-h Loss: {:.6}", loss_minus);
                error!("Estimated_gradient: {:.6}", estimated);
                error!("Backpropagation gradient: {:.6}", backprop);
                error!("Relative Error: {:.6}", rel);
                return Ok(GradCheckReport::Failed(GradCheckFailure {
                    parameter: name,
                    index,
                    loss_plus,
                    loss_minus,
                    estimated,
                    backprop,
                    relative_error: rel,
                }));
            }
        }
        info!("Gradient check for parameter {} passed.", name);
    }
    Ok(GradCheckReport::Passed)
}
