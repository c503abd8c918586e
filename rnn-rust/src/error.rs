// ============================================================================
// ERRORS
// ============================================================================

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum RnnError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// `epoch` is set when the value turned up during training.
    #[error("Non-finite value in {what}{}", .epoch.map(|e| format!(" at epoch {}", e)).unwrap_or_default())]
    NonFinite { what: String, epoch: Option<usize> },

    #[error("Index {0} is not in the vocabulary")]
    UnknownIndex(usize),

    #[error("Token {0:?} is not in the vocabulary")]
    UnknownToken(String),

    #[error("Sampling gave up after {attempts} attempts without a non-empty sentence")]
    SamplingExhausted { attempts: usize },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RnnError>;
