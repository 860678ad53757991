//! Error types for evaluation runs

use fade_core::DecayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Decay(#[from] DecayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stream or record line that could not be interpreted
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl EvalError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Whether the error concerns a single input item rather than the
    /// stream as a whole
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Decay(DecayError::MalformedEvent(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
