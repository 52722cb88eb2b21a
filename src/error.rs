//! Error types shared by every engine component.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Only input problems and caller-driven cancellation abort a request.
/// Numerical trouble (IRR not converging) and infeasible searches (no
/// capacity meets a threshold) are reported as flags inside the results.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request rejected before any simulation ran.
    #[error("invalid input at `{field}`: {message}")]
    Input { field: String, message: String },

    /// The sweep observed a fired cancellation token.
    #[error("sweep cancelled before completion")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    /// Shorthand for an [`EngineError::Input`] on a named field.
    pub fn input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Input {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The offending field for input errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Input { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Rejects non-finite or non-positive values for `field`.
pub(crate) fn ensure_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::input(field, format!("must be > 0, got {value}")));
    }
    Ok(())
}

/// Rejects non-finite or negative values for `field`.
pub(crate) fn ensure_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::input(field, format!("must be >= 0, got {value}")));
    }
    Ok(())
}

/// Rejects values outside `[lo, hi]` (inclusive).
pub(crate) fn ensure_in_range(field: &str, value: f64, lo: f64, hi: f64) -> Result<()> {
    if !value.is_finite() || value < lo || value > hi {
        return Err(EngineError::input(
            field,
            format!("must be in [{lo}, {hi}], got {value}"),
        ));
    }
    Ok(())
}
