//! Multi-year battery capacity fade with end-of-life replacement.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ensure_in_range};

/// Linear capacity fade: a first-year drop, then a flat loss per year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BessDegradation {
    /// Capacity lost during the first year of operation, % of nameplate.
    pub year1_pct: f64,
    /// Capacity lost in every following year, % of nameplate.
    pub annual_pct: f64,
    /// Remaining capacity (% of nameplate) below which the pack is replaced.
    pub end_of_life_pct: f64,
}

impl Default for BessDegradation {
    fn default() -> Self {
        Self {
            year1_pct: 3.0,
            annual_pct: 2.0,
            end_of_life_pct: 80.0,
        }
    }
}

/// Remaining capacity per project year and the years a replacement occurs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityTrajectory {
    /// `factors[y - 1]` is the remaining capacity fraction during year `y`.
    pub factors: Vec<f64>,
    /// Years at whose end the pack is swapped for a new one.
    pub replacement_years: Vec<u32>,
}

impl CapacityTrajectory {
    /// Capacity fraction for 1-based `year`; 1.0 outside the trajectory.
    pub fn factor(&self, year: u32) -> f64 {
        year.checked_sub(1)
            .and_then(|i| self.factors.get(i as usize))
            .copied()
            .unwrap_or(1.0)
    }
}

impl BessDegradation {
    /// # Errors
    ///
    /// Returns `EngineError::Input` when a percentage is out of range.
    pub fn validate(&self) -> Result<()> {
        ensure_in_range("bess.degradation.year1_pct", self.year1_pct, 0.0, 100.0)?;
        ensure_in_range("bess.degradation.annual_pct", self.annual_pct, 0.0, 100.0)?;
        ensure_in_range(
            "bess.degradation.end_of_life_pct",
            self.end_of_life_pct,
            0.0,
            100.0,
        )?;
        Ok(())
    }

    /// Remaining fraction after `age` years of service (age 1 = first year).
    fn fraction_at_age(&self, age: u32) -> f64 {
        let lost = self.year1_pct + self.annual_pct * f64::from(age.saturating_sub(1));
        (1.0 - lost / 100.0).max(0.0)
    }

    /// Capacity fade over `horizon_years`.
    ///
    /// A pack that drops below the end-of-life threshold during year `y`
    /// serves out that year and is replaced at its end; year `y + 1` starts
    /// with a fresh pack. No replacement is recorded in the final year.
    pub fn trajectory(&self, horizon_years: u32) -> CapacityTrajectory {
        let threshold = self.end_of_life_pct / 100.0;
        let mut factors = Vec::with_capacity(horizon_years as usize);
        let mut replacement_years = Vec::new();
        let mut age = 1;
        for year in 1..=horizon_years {
            let factor = self.fraction_at_age(age);
            factors.push(factor);
            if factor < threshold && year < horizon_years {
                replacement_years.push(year);
                age = 1;
            } else {
                age += 1;
            }
        }
        CapacityTrajectory {
            factors,
            replacement_years,
        }
    }
}
