//! Error taxonomy shared by all engines.
//!
//! Degenerate inputs (a flat `max == min` image) are deliberately absent:
//! operations that normalize short-circuit to the unchanged input instead.

use thiserror::Error;

/// Errors returned by the slice engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A parameter is out of its domain or a kernel/window name is unknown.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable description of the violation.
        reason: String,
    },

    /// A linear-algebra step failed (singular system, non-finite solution).
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// Two images that must share a shape do not.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape of the reference operand.
        expected: (usize, usize),
        /// Shape of the other operand.
        actual: (usize, usize),
    },
}

impl EngineError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
