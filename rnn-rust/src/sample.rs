// ============================================================================
// GENERATION
// ============================================================================

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::debug;

use crate::config::SampleConfig;
use crate::error::{Result, RnnError};
use crate::model::Rnn;
use crate::vocab::Vocabulary;

/// One categorical draw from `probs`.
pub fn sample_index(probs: &[f64], rng: &mut impl Rng) -> Result<usize> {
    let dist = WeightedIndex::new(probs)
        .map_err(|e| RnnError::NonFinite { what: format!("output distribution ({})", e), epoch: None })?;
    Ok(dist.sample(rng))
}

/// Grows one sequence from the start marker. `None` when it hit `max_len` first.
fn draw_sequence(rnn: &Rnn, vocab: &Vocabulary, rng: &mut impl Rng, max_len: usize) -> Result<Option<Vec<usize>>> {
    let end = vocab.end_index();
    let mut seq = vec![vocab.start_index()];
    while seq.last() != Some(&end) {
        if seq.len() >= max_len { return Ok(None); }
        let probs = rnn.forward_propagation(&seq)?;
        let last = probs.last().map(Vec::as_slice).unwrap_or_default();
        seq.push(sample_index(last, &mut *rng)?);
        if seq.len() >= 3 && tracing::enabled!(tracing::Level::DEBUG) {
            let partial = &seq[1..seq.len() - 1];
            debug!("{}", vocab.decode(partial)?.join(" "));
        }
    }
    Ok(Some(seq))
}

/// Content tokens of one sampled sentence, start and end markers excluded.
/// Empty draws are retried up to `config.max_attempts` times.
pub fn generate_sentence(rnn: &Rnn, vocab: &Vocabulary, rng: &mut impl Rng, config: &SampleConfig) -> Result<Vec<String>> {
    if vocab.len() != rnn.word_dim() {
        return Err(RnnError::ShapeMismatch(format!(
            "vocabulary has {} tokens but the model expects {}",
            vocab.len(), rnn.word_dim()
        )));
    }
    for attempt in 1..=config.max_attempts {
        match draw_sequence(rnn, vocab, &mut *rng, config.max_len)? {
            Some(seq) if seq.len() >= 3 => return vocab.decode(&seq[1..seq.len() - 1]),
            Some(_) => debug!("Redoing sentence (attempt {}): no content tokens", attempt),
            None => debug!("Redoing sentence (attempt {}): no end token within {} steps", attempt, config.max_len),
        }
    }
    Err(RnnError::SamplingExhausted { attempts: config.max_attempts })
}

pub fn generate_sentences(rnn: &Rnn, vocab: &Vocabulary, rng: &mut impl Rng, config: &SampleConfig, n: usize) -> Result<Vec<Vec<String>>> {
    (0..n).map(|_| generate_sentence(rnn, vocab, &mut *rng, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::params::Params;
    use crate::vocab::{SENTENCE_END, SENTENCE_START, UNKNOWN_TOKEN};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // Indices: a=0, b=1, unknown=2, start=3, end=4.
    fn vocab() -> Vocabulary {
        let toks = ["a", "b", UNKNOWN_TOKEN, SENTENCE_START, SENTENCE_END];
        Vocabulary::from_tokens(toks.iter().map(|t| t.to_string()).collect()).expect("vocab")
    }

    /// Hidden unit `k` lights up for input token `k` only (W = 0), and V routes
    /// each lit unit to a single output with overwhelming logit.
    fn routed_model(routes: &[(usize, usize)]) -> Rnn {
        let n = 5;
        let mut u = Matrix::zeros(n, n);
        for k in 0..n { u.set(k, k, 5.0); }
        let mut v = Matrix::zeros(n, n);
        for &(from, to) in routes { v.set(to, from, 1000.0); }
        let params = Params::from_matrices(u, v, Matrix::zeros(n, n)).expect("params");
        Rnn::from_params(params, 4).expect("model")
    }

    #[test]
    fn deterministic_model_yields_single_token() {
        // start -> a -> end
        let rnn = routed_model(&[(3, 0), (0, 4)]);
        let mut rng = StdRng::seed_from_u64(0);
        let s = generate_sentence(&rnn, &vocab(), &mut rng, &SampleConfig::default()).expect("sample");
        assert_eq!(s, vec!["a".to_string()]);
    }

    #[test]
    fn empty_sentences_exhaust_retries() {
        // start -> end, every time
        let rnn = routed_model(&[(3, 4)]);
        let mut rng = StdRng::seed_from_u64(0);
        let cfg = SampleConfig { max_attempts: 3, max_len: 10 };
        assert!(matches!(
            generate_sentence(&rnn, &vocab(), &mut rng, &cfg),
            Err(RnnError::SamplingExhausted { attempts: 3 })
        ));
    }

    #[test]
    fn endless_sentences_hit_length_cap() {
        // start -> a -> a -> ...
        let rnn = routed_model(&[(3, 0), (0, 0)]);
        let mut rng = StdRng::seed_from_u64(0);
        let cfg = SampleConfig { max_attempts: 2, max_len: 6 };
        assert!(matches!(
            generate_sentence(&rnn, &vocab(), &mut rng, &cfg),
            Err(RnnError::SamplingExhausted { attempts: 2 })
        ));
    }

    #[test]
    fn vocabulary_size_must_match_model() {
        let mut rng = StdRng::seed_from_u64(0);
        let cfg = crate::config::ModelConfig { vocab_size: 7, hidden_dim: 2, ..Default::default() };
        let rnn = Rnn::new(&cfg, &mut rng).expect("model");
        assert!(matches!(
            generate_sentence(&rnn, &vocab(), &mut rng, &SampleConfig::default()),
            Err(RnnError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn sample_index_follows_distribution() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(sample_index(&[0.0, 1.0, 0.0], &mut rng).expect("draw"), 1);
        }
        assert!(sample_index(&[f64::NAN, 1.0], &mut rng).is_err());
    }
}
