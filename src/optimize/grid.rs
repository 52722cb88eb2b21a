//! Candidate grids and cooperative cancellation for sweeps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result, ensure_in_range, ensure_non_negative, ensure_positive};

/// Largest number of candidates a single sweep may enumerate.
pub const MAX_GRID_POINTS: usize = 100_000;

/// Inclusive capacity range enumerated in fixed steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacityRange {
    pub min_kwp: f64,
    pub max_kwp: f64,
    pub step_kwp: f64,
}

impl CapacityRange {
    /// # Errors
    ///
    /// Returns `EngineError::Input` for a negative minimum, an inverted range,
    /// a non-positive step, or a grid larger than [`MAX_GRID_POINTS`].
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("capacity_min", self.min_kwp)?;
        ensure_non_negative("capacity_max", self.max_kwp)?;
        ensure_positive("capacity_step", self.step_kwp)?;
        if self.max_kwp < self.min_kwp {
            return Err(EngineError::input(
                "capacity_max",
                format!("{} is below capacity_min {}", self.max_kwp, self.min_kwp),
            ));
        }
        if self.len() > MAX_GRID_POINTS {
            return Err(EngineError::input(
                "capacity_step",
                format!("grid of {} points exceeds {MAX_GRID_POINTS}", self.len()),
            ));
        }
        Ok(())
    }

    /// Number of grid points; `min + i × step` for `i` in `0..len`.
    pub fn len(&self) -> usize {
        if self.step_kwp <= 0.0 || self.max_kwp < self.min_kwp {
            return 0;
        }
        ((self.max_kwp - self.min_kwp) / self.step_kwp + 1e-9).floor() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacities in ascending order, each computed from its index so the
    /// grid does not accumulate rounding error.
    pub fn capacities(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.min_kwp + i as f64 * self.step_kwp)
            .collect()
    }
}

/// Checks that every threshold is a percentage.
///
/// # Errors
///
/// Returns `EngineError::Input` naming the first threshold outside [0, 100].
pub fn validate_thresholds(field: &str, thresholds: &[f64]) -> Result<()> {
    for (i, t) in thresholds.iter().enumerate() {
        ensure_in_range(&format!("{field}[{i}]"), *t, 0.0, 100.0)?;
    }
    Ok(())
}

/// Cooperative cancellation flag shared between a sweep and its caller.
///
/// Cloning shares the flag. Sweeps check it before every candidate and stop
/// with `EngineError::Cancelled` once it fires.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// # Errors
    ///
    /// Returns `EngineError::Cancelled` once [`CancelToken::cancel`] was called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: f64, max: f64, step: f64) -> CapacityRange {
        CapacityRange {
            min_kwp: min,
            max_kwp: max,
            step_kwp: step,
        }
    }

    #[test]
    fn grid_includes_both_ends() {
        assert_eq!(range(0.0, 100.0, 10.0).capacities().len(), 11);
        assert_eq!(range(50.0, 50.0, 10.0).capacities(), vec![50.0]);
    }

    #[test]
    fn inexact_step_stays_within_max() {
        let caps = range(0.1, 0.7, 0.2).capacities();
        assert_eq!(caps.len(), 4);
        assert!(caps.iter().all(|c| *c <= 0.7 + 1e-9));
        let caps = range(0.0, 25.0, 10.0).capacities();
        assert_eq!(caps, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert_eq!(
            range(10.0, 5.0, 1.0).validate().expect_err("must fail").field(),
            Some("capacity_max")
        );
        assert_eq!(
            range(0.0, 5.0, 0.0).validate().expect_err("must fail").field(),
            Some("capacity_step")
        );
        assert!(range(0.0, 1e9, 1.0).validate().is_err());
    }

    #[test]
    fn thresholds_must_be_percentages() {
        assert!(validate_thresholds("thresholds", &[95.0, 0.0, 100.0]).is_ok());
        let err = validate_thresholds("thresholds", &[90.0, 101.0]).expect_err("must fail");
        assert_eq!(err.field(), Some("thresholds[1]"));
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());
        token.cancel();
        assert!(matches!(clone.check(), Err(EngineError::Cancelled)));
    }
}
