// ============================================================================
// CONFIGURATION
// ============================================================================

use std::path::PathBuf;

use crate::bptt::DEFAULT_BPTT_TRUNCATE;
use crate::error::{Result, RnnError};

/// Model hyperparameters fixed at construction time.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub hidden_dim: usize,
    /// Number of earlier timesteps the backward pass reaches into.
    pub bptt_truncate: usize,
    /// Overwritten in place at every loss evaluation when set.
    pub checkpoint: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: 2575,
            hidden_dim: 100,
            bptt_truncate: DEFAULT_BPTT_TRUNCATE,
            checkpoint: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 || self.hidden_dim == 0 {
            return Err(RnnError::InvalidConfig(format!(
                "vocab_size ({}) and hidden_dim ({}) must be positive",
                self.vocab_size, self.hidden_dim
            )));
        }
        Ok(())
    }
}

/// SGD schedule.
#[derive(Clone, Debug)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub nepoch: usize,
    pub evaluate_loss_after: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.005,
            nepoch: 1,
            evaluate_loss_after: 5,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.evaluate_loss_after == 0 {
            return Err(RnnError::InvalidConfig(
                "evaluate_loss_after must be at least 1".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(RnnError::InvalidConfig(format!(
                "learning_rate must be a positive finite number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SampleConfig {
    /// Restarts allowed when a draw produces no content tokens.
    pub max_attempts: usize,
    /// Longest sequence (start marker included) a single attempt may grow to.
    pub max_len: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            max_len: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ModelConfig::default().validate().is_ok());
        assert!(TrainConfig::default().validate().is_ok());
        assert_eq!(ModelConfig::default().bptt_truncate, 4);
    }

    #[test]
    fn zero_evaluation_interval_is_rejected() {
        let cfg = TrainConfig {
            evaluate_loss_after: 0,
            ..TrainConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RnnError::InvalidConfig(_))));
    }

    #[test]
    fn zero_hidden_dim_is_rejected() {
        let cfg = ModelConfig {
            hidden_dim: 0,
            ..ModelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
