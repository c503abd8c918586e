// ============================================================================
// RNN MODEL
// Owns the parameters; only `sgd_step` and `load_into` mutate them.
// ============================================================================

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::bptt::{self, Gradients};
use crate::config::ModelConfig;
use crate::corpus::Example;
use crate::error::{Result, RnnError};
use crate::forward;
use crate::params::Params;

#[derive(Clone, Debug)]
pub struct Rnn {
    pub params: Params,
    pub bptt_truncate: usize,
    pub checkpoint: Option<PathBuf>,
    /// Incremented once per completed epoch, not per example. The name is historical.
    pub num_examples_seen: usize,
}

impl Rnn {
    pub fn new(config: &ModelConfig, rng: &mut impl Rng) -> Result<Self> {
        config.validate()?;
        Ok(Rnn {
            params: Params::new(config.vocab_size, config.hidden_dim, rng),
            bptt_truncate: config.bptt_truncate,
            checkpoint: config.checkpoint.clone(),
            num_examples_seen: 0,
        })
    }

    pub fn from_params(params: Params, bptt_truncate: usize) -> Result<Self> {
        params.validate()?;
        Ok(Rnn { params, bptt_truncate, checkpoint: None, num_examples_seen: 0 })
    }

    pub fn from_checkpoint(fp: &Path, bptt_truncate: usize) -> Result<Self> {
        Rnn::from_params(Params::load(fp)?, bptt_truncate)
    }

    pub fn word_dim(&self) -> usize { self.params.word_dim() }
    pub fn hidden_dim(&self) -> usize { self.params.hidden_dim() }

    pub fn forward_propagation(&self, xs: &[usize]) -> Result<Vec<Vec<f64>>> {
        Ok(forward::forward_propagation(&self.params, xs)?.outputs)
    }

    pub fn predict(&self, xs: &[usize]) -> Result<Vec<usize>> {
        forward::predict(&self.params, xs)
    }

    pub fn ce_error(&self, xs: &[usize], ys: &[usize]) -> Result<f64> {
        bptt::ce_error(&self.params, xs, ys)
    }

    pub fn calculate_total_loss(&self, examples: &[Example]) -> Result<f64> {
        bptt::total_loss(&self.params, examples)
    }

    pub fn calculate_loss(&self, examples: &[Example]) -> Result<f64> {
        bptt::mean_loss(&self.params, examples)
    }

    /// Gradients under the model's own truncation bound.
    pub fn bptt(&self, xs: &[usize], ys: &[usize]) -> Result<Gradients> {
        Ok(bptt::bptt(&self.params, xs, ys, self.bptt_truncate)?.0)
    }

    /// One SGD update. Non-finite gradients are refused so the weights stay intact.
    pub fn sgd_step(&mut self, xs: &[usize], ys: &[usize], learning_rate: f64) -> Result<()> {
        let grads = self.bptt(xs, ys)?;
        if !grads.is_finite() {
            return Err(RnnError::NonFinite {
                what: format!("gradient for a {}-token example at learning rate {}", xs.len(), learning_rate),
                epoch: None,
            });
        }
        self.params.apply_gradients(&grads, learning_rate);
        Ok(())
    }

    pub fn save(&self, fp: &Path) -> Result<()> { self.params.save(fp) }

    /// Replaces the weights and with them `hidden_dim` and `word_dim`.
    pub fn load_into(&mut self, fp: &Path) -> Result<()> {
        self.params = Params::load(fp)?;
        Ok(())
    }
}
