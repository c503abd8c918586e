// ============================================================================
// RNN LANGUAGE MODEL
// Vanilla recurrent model: s_t = tanh(U x_t + W s_{t-1}), o_t = softmax(V s_t),
// trained with truncated BPTT and per-example SGD. The parameters live in an
// `Rnn` that the trainer mutates through `&mut`; everything else borrows them.
// ============================================================================

pub mod bptt;
pub mod config;
pub mod corpus;
pub mod error;
pub mod forward;
pub mod gradcheck;
pub mod matrix;
pub mod model;
pub mod params;
pub mod sample;
pub mod train;
pub mod vocab;

// Re-export commonly used items
pub use config::{ModelConfig, SampleConfig, TrainConfig};
pub use corpus::{Corpus, Example};
pub use error::{Result, RnnError};
pub use gradcheck::{gradient_check, GradCheckReport};
pub use model::Rnn;
pub use params::{ParamName, Params};
pub use sample::{generate_sentence, generate_sentences};
pub use train::{train_with_sgd, TrainReport};
pub use vocab::Vocabulary;
