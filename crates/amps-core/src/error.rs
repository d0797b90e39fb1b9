//! Unified error types for the amps ecosystem
//!
//! This module provides a common error type [`ElecError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `ElecError` for uniform error handling at API boundaries.
//!
//! Note that *simulated* faults (a failed generator, a tripped breaker) are
//! ordinary state flags, not errors; see the crate docs. `ElecError` covers
//! implementation-level failures only: bad configuration, persistence
//! mismatches, lifecycle misuse.

use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Unified error type for all engine operations.
#[derive(Error, Debug)]
pub enum ElecError {
    /// I/O errors (snapshot file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network construction failed; carries every issue found, with entity
    /// and source-line context, not just the first.
    #[error("Construction error: {}", .0.summary())]
    Construction(Diagnostics),

    /// Data validation errors outside construction
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors (bad descriptor field values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lifecycle misuse (e.g. starting an already-started system)
    #[error("System is already running")]
    AlreadyRunning,

    /// Snapshot refused: persisted state does not match this configuration
    #[error("Snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using ElecError.
pub type ElecResult<T> = Result<T, ElecError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for ElecError {
    fn from(err: anyhow::Error) -> Self {
        ElecError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for ElecError {
    fn from(s: String) -> Self {
        ElecError::Other(s)
    }
}

impl From<&str> for ElecError {
    fn from(s: &str) -> Self {
        ElecError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ElecError::Config("battery volts must be positive".into());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("battery volts"));
    }

    #[test]
    fn test_construction_error_carries_diagnostics() {
        let mut diag = Diagnostics::new();
        diag.add_error_with_entity("link", "missing a network link", "GEN_1");
        diag.add_error("domain", "AC/DC mismatch");
        let err = ElecError::Construction(diag);
        let text = err.to_string();
        assert!(text.contains("2 errors"));
        if let ElecError::Construction(d) = err {
            assert_eq!(d.error_count(), 2);
        } else {
            panic!("wrong variant");
        }
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ElecResult<()> {
            Err(ElecError::Validation("test".into()))
        }

        fn outer() -> ElecResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ElecError = io_err.into();
        assert!(matches!(err, ElecError::Io(_)));
    }
}
