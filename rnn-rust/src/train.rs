// ============================================================================
// TRAINING
// ============================================================================

use std::time::{Duration, Instant};

use tracing::info;

use crate::config::TrainConfig;
use crate::corpus::Example;
use crate::error::{Result, RnnError};
use crate::model::Rnn;

pub struct TrainReport {
    /// `(num_examples_seen, mean loss)` at every evaluation.
    pub losses: Vec<(usize, f64)>,
    pub final_learning_rate: f64,
    pub elapsed: Duration,
}

/// Halves the rate when the latest recorded loss is worse than the one before.
/// Only the last two evaluations are compared.
pub fn adapt_learning_rate(losses: &[(usize, f64)], learning_rate: f64) -> f64 {
    match losses {
        [.., (_, prev), (_, last)] if last > prev => learning_rate * 0.5,
        _ => learning_rate,
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Per-example SGD over `examples` in corpus order, `nepoch` times.
pub fn train_with_sgd(rnn: &mut Rnn, examples: &[Example], config: &TrainConfig) -> Result<TrainReport> {
    config.validate()?;
    let t0 = Instant::now();
    let mut learning_rate = config.learning_rate;
    let mut losses: Vec<(usize, f64)> = Vec::new();

    info!(
        "Training: hidden={} vocab={} bptt_truncate={} lr={} epochs={} examples={}",
        rnn.hidden_dim(), rnn.word_dim(), rnn.bptt_truncate, learning_rate, config.nepoch, examples.len()
    );

    for epoch in 0..config.nepoch {
        if epoch % config.evaluate_loss_after == 0 {
            let loss = rnn.calculate_loss(examples)?;
            losses.push((rnn.num_examples_seen, loss));
            info!(
                "{}: Loss after num_examples_seen={} epoch={}: {:.6}",
                timestamp(), rnn.num_examples_seen, epoch, loss
            );
            if !loss.is_finite() {
                return Err(RnnError::NonFinite { what: format!("mean loss {}", loss), epoch: Some(epoch) });
            }
            if let Some(fp) = &rnn.checkpoint {
                rnn.save(fp)?;
            }
            let adjusted = adapt_learning_rate(&losses, learning_rate);
            if adjusted != learning_rate {
                learning_rate = adjusted;
                info!("Setting learning rate to {:.6}", learning_rate);
            }
        }
        for ex in examples {
            rnn.sgd_step(&ex.x, &ex.y, learning_rate).map_err(|e| match e {
                RnnError::NonFinite { what, .. } => RnnError::NonFinite { what, epoch: Some(epoch) },
                other => other,
            })?;
        }
        rnn.num_examples_seen += 1;
    }

    let elapsed = t0.elapsed();
    info!(
        "Done in {:.1}s | {} evaluations | final lr {:.6}",
        elapsed.as_secs_f64(), losses.len(), learning_rate
    );
    Ok(TrainReport { losses, final_learning_rate: learning_rate, elapsed })
}
