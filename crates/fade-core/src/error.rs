//! Error types for the decay engine

use thiserror::Error;

/// Errors raised by decay functions, aggregators and the oracle
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecayError {
    /// Bad decay parameters or engine settings; fatal at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Event that cannot be aggregated (non-finite or negative fields)
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The oracle arena is full; the experiment ran past its horizon
    #[error("Experiment horizon exceeded: oracle retains at most {capacity} events")]
    HorizonExceeded { capacity: usize },
}

/// Result alias used across fade-core
pub type Result<T> = std::result::Result<T, DecayError>;

/// Reject values that are not finite and strictly positive.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DecayError::InvalidConfig(format!(
            "{name} must be a finite number greater than 0, given {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive("rate", 0.5).is_ok());
        assert!(ensure_positive("rate", 0.0).is_err());
        assert!(ensure_positive("rate", -1.0).is_err());
        assert!(ensure_positive("rate", f64::NAN).is_err());
        assert!(ensure_positive("rate", f64::INFINITY).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = DecayError::HorizonExceeded { capacity: 10 };
        assert_eq!(
            err.to_string(),
            "Experiment horizon exceeded: oracle retains at most 10 events"
        );
    }
}
