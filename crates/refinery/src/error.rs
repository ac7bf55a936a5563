//! Error types for the refinement pipeline.
//!
//! The taxonomy distinguishes failures that are recovered locally inside the
//! refiner's retry loop (`Collaborator`, `Deserialization`) from the single
//! terminal kind callers must handle (`RefinementExhausted`). An empty
//! segmentation result is not an error at all — the walker recovers it with a
//! whole-text fallback.

use thiserror::Error;

/// Result type alias for refinery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the refinement pipeline.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (bad builder parameters, invalid anchor pattern).
    ///
    /// Not retryable - requires a configuration fix.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller contract violation (malformed schema, empty anchor keyword).
    ///
    /// Not retryable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external generative-text collaborator failed (network, auth, quota,
    /// timeout). Consumed as one attempt by the refiner's retry loop and only
    /// surfaced after budget exhaustion.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// The collaborator's response text was not valid JSON.
    ///
    /// Treated identically to [`Error::Collaborator`] for retry purposes.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Terminal failure: every retry attempt for one (text, schema) pair was
    /// spent. Propagates up through the walker and fails the entire request —
    /// partial results are never returned.
    #[error("Refinement exhausted after {attempts} attempts: {last_error}")]
    RefinementExhausted {
        /// Number of attempts that were made before giving up.
        attempts: usize,
        /// Rendering of the failure that spent the final attempt.
        last_error: String,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create an invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a collaborator error.
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Error::Collaborator(msg.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Error::Deserialization(msg.into())
    }

    /// Whether this failure is consumed by the refiner's retry loop. A
    /// non-retryable failure aborts the loop and surfaces unchanged.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Error::Collaborator(_) | Error::Deserialization(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialization(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_collaborator() {
        let err = Error::collaborator("connection refused");
        assert_eq!(err.to_string(), "Collaborator error: connection refused");
    }

    #[test]
    fn test_display_exhausted() {
        let err = Error::RefinementExhausted {
            attempts: 3,
            last_error: "Deserialization error: EOF".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("3 attempts"));
        assert!(rendered.contains("EOF"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::collaborator("x").retryable());
        assert!(Error::deserialization("x").retryable());
        assert!(!Error::configuration("x").retryable());
        assert!(!Error::invalid_input("x").retryable());
        assert!(!Error::RefinementExhausted {
            attempts: 1,
            last_error: "x".to_string()
        }
        .retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Deserialization(_)));
        assert!(err.retryable());
    }
}
