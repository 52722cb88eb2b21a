//! KPI-to-points transfer functions.
//!
//! Breakpoints are deployment policy and travel with each request; the
//! defaults below are only a starting point.

use serde::{Deserialize, Serialize};

use super::weights::Bucket;
use crate::error::{EngineError, Result, ensure_non_negative};

/// Tolerance on the member weight sum of a bucket.
const MEMBER_SUM_TOLERANCE: f64 = 1e-6;

/// Monotonic mapping from a KPI value to 0-100 points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferFunction {
    /// 0 points at or below `floor`, 100 at or above `ceiling`.
    Linear { floor: f64, ceiling: f64 },
    /// 100 points at or below `best`, 0 at or above `worst`.
    InverseLinear { best: f64, worst: f64 },
}

impl TransferFunction {
    /// Points for `value`; a missing value scores zero.
    pub fn points(&self, value: Option<f64>) -> f64 {
        let Some(x) = value.filter(|v| v.is_finite()) else {
            return 0.0;
        };
        let t = match *self {
            TransferFunction::Linear { floor, ceiling } => (x - floor) / (ceiling - floor),
            TransferFunction::InverseLinear { best, worst } => (worst - x) / (worst - best),
        };
        100.0 * t.clamp(0.0, 1.0)
    }

    fn validate(&self, field: &str) -> Result<()> {
        let (a, b) = match *self {
            TransferFunction::Linear { floor, ceiling } => (floor, ceiling),
            TransferFunction::InverseLinear { best, worst } => (best, worst),
        };
        if !a.is_finite() || !b.is_finite() || b <= a {
            return Err(EngineError::input(
                field,
                format!("breakpoints must be finite and increasing, got {a} and {b}"),
            ));
        }
        Ok(())
    }
}

/// A scored KPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    Npv,
    Irr,
    PaybackYears,
    ConservativeNpv,
    PaybackMargin,
    Lcoe,
    Autoconsumption,
    Coverage,
    Co2Reduction,
}

impl Kpi {
    pub fn label(self) -> &'static str {
        match self {
            Kpi::Npv => "NPV",
            Kpi::Irr => "IRR",
            Kpi::PaybackYears => "payback",
            Kpi::ConservativeNpv => "conservative NPV",
            Kpi::PaybackMargin => "payback margin",
            Kpi::Lcoe => "LCOE",
            Kpi::Autoconsumption => "autoconsumption",
            Kpi::Coverage => "coverage",
            Kpi::Co2Reduction => "CO2 reduction",
        }
    }
}

/// One KPI inside one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KpiRule {
    pub bucket: Bucket,
    pub kpi: Kpi,
    /// Share of the bucket score.
    pub weight: f64,
    pub transfer: TransferFunction,
}

/// The complete KPI table. A KPI may appear in several buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringPolicy {
    pub rules: Vec<KpiRule>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        use Bucket::*;
        use TransferFunction::*;

        let rule = |bucket, kpi, weight, transfer| KpiRule {
            bucket,
            kpi,
            weight,
            transfer,
        };
        Self {
            rules: vec![
                rule(Value, Kpi::Npv, 0.5, Linear { floor: 0.0, ceiling: 2_000_000.0 }),
                rule(Value, Kpi::Irr, 0.3, Linear { floor: 0.0, ceiling: 0.20 }),
                rule(Value, Kpi::PaybackYears, 0.2, InverseLinear { best: 3.0, worst: 15.0 }),
                rule(Robustness, Kpi::ConservativeNpv, 0.6, Linear { floor: 0.0, ceiling: 1_500_000.0 }),
                rule(Robustness, Kpi::PaybackMargin, 0.4, Linear { floor: 0.0, ceiling: 15.0 }),
                rule(Technical, Kpi::Autoconsumption, 0.4, Linear { floor: 50.0, ceiling: 100.0 }),
                rule(Technical, Kpi::Coverage, 0.3, Linear { floor: 0.0, ceiling: 60.0 }),
                rule(Technical, Kpi::Lcoe, 0.3, InverseLinear { best: 150.0, worst: 600.0 }),
                rule(Esg, Kpi::Co2Reduction, 0.7, Linear { floor: 0.0, ceiling: 500.0 }),
                rule(Esg, Kpi::Coverage, 0.3, Linear { floor: 0.0, ceiling: 60.0 }),
            ],
        }
    }
}

impl ScoringPolicy {
    pub fn rules_for(&self, bucket: Bucket) -> impl Iterator<Item = &KpiRule> {
        self.rules.iter().filter(move |r| r.bucket == bucket)
    }

    /// # Errors
    ///
    /// Returns `EngineError::Input` for malformed breakpoints, a negative
    /// weight, an empty bucket, or member weights not summing to 1.
    pub fn validate(&self) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            ensure_non_negative(&format!("policy.rules[{i}].weight"), rule.weight)?;
            rule.transfer.validate(&format!("policy.rules[{i}].transfer"))?;
        }
        for bucket in Bucket::ALL {
            let field = format!("policy.{}", bucket.label().to_lowercase());
            let mut members = self.rules_for(bucket).peekable();
            if members.peek().is_none() {
                return Err(EngineError::input(field, "bucket has no KPI"));
            }
            let sum: f64 = members.map(|r| r.weight).sum();
            if (sum - 1.0).abs() > MEMBER_SUM_TOLERANCE {
                return Err(EngineError::input(
                    field,
                    format!("member weights sum to {sum}, expected 1.0"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_is_clipped() {
        let f = TransferFunction::Linear {
            floor: 0.0,
            ceiling: 100.0,
        };
        assert_eq!(f.points(Some(-5.0)), 0.0);
        assert_eq!(f.points(Some(25.0)), 25.0);
        assert_eq!(f.points(Some(500.0)), 100.0);
        assert_eq!(f.points(None), 0.0);
    }

    #[test]
    fn inverse_prefers_lower_values() {
        let f = TransferFunction::InverseLinear {
            best: 4.0,
            worst: 12.0,
        };
        assert_eq!(f.points(Some(2.0)), 100.0);
        assert_eq!(f.points(Some(8.0)), 50.0);
        assert_eq!(f.points(Some(20.0)), 0.0);
        assert!(f.points(Some(5.0)) > f.points(Some(6.0)));
    }

    #[test]
    fn default_policy_is_valid() {
        assert!(ScoringPolicy::default().validate().is_ok());
    }

    #[test]
    fn member_weights_must_sum_to_one() {
        let mut policy = ScoringPolicy::default();
        policy.rules[0].weight = 0.9;
        assert_eq!(policy.validate().expect_err("must fail").field(), Some("policy.value"));
    }

    #[test]
    fn inverted_breakpoints_are_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.rules[1].transfer = TransferFunction::Linear {
            floor: 1.0,
            ceiling: 0.0,
        };
        assert_eq!(
            policy.validate().expect_err("must fail").field(),
            Some("policy.rules[1].transfer")
        );
    }
}
