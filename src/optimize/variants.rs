//! Selection of representative variants from a completed sweep.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::sweep::{EconomicSummary, ScenarioResult};
use crate::error::{EngineError, Result, ensure_in_range};
use crate::sim::types::{BessStatus, CapacityScenario, SimulationResult};

/// Identifies a representative variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    A,
    B,
    C,
    D,
    #[serde(rename = "NPV")]
    NpvOptimal,
    #[serde(rename = "SEASONALITY")]
    SeasonalityOptimal,
}

impl VariantKind {
    pub const THRESHOLD_KINDS: [VariantKind; 4] =
        [VariantKind::A, VariantKind::B, VariantKind::C, VariantKind::D];

    pub fn label(self) -> &'static str {
        match self {
            VariantKind::A => "A",
            VariantKind::B => "B",
            VariantKind::C => "C",
            VariantKind::D => "D",
            VariantKind::NpvOptimal => "NPV",
            VariantKind::SeasonalityOptimal => "SEASONALITY",
        }
    }
}

/// Autoconsumption thresholds (%) defining variants A-D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "UPPERCASE")]
pub struct Thresholds {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            a: 95.0,
            b: 90.0,
            c: 85.0,
            d: 80.0,
        }
    }
}

impl Thresholds {
    pub fn pairs(&self) -> [(VariantKind, f64); 4] {
        [
            (VariantKind::A, self.a),
            (VariantKind::B, self.b),
            (VariantKind::C, self.c),
            (VariantKind::D, self.d),
        ]
    }

    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first threshold outside [0, 100].
    pub fn validate(&self) -> Result<()> {
        for (kind, t) in self.pairs() {
            ensure_in_range(&format!("thresholds.{}", kind.label()), t, 0.0, 100.0)?;
        }
        Ok(())
    }
}

/// NPV selection rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NpvMode {
    /// Best NPV among candidates with autoconsumption in `[low_pct, high_pct]`.
    Constrained { low_pct: f64, high_pct: f64 },
    /// Best NPV overall.
    Unconstrained,
}

impl NpvMode {
    /// # Errors
    ///
    /// Returns `EngineError::Input` for bounds outside [0, 100] or inverted.
    pub fn validate(&self) -> Result<()> {
        if let NpvMode::Constrained { low_pct, high_pct } = *self {
            ensure_in_range("npv_mode.low_pct", low_pct, 0.0, 100.0)?;
            ensure_in_range("npv_mode.high_pct", high_pct, 0.0, 100.0)?;
            if low_pct > high_pct {
                return Err(EngineError::input(
                    "npv_mode.high_pct",
                    format!("must be >= low_pct ({low_pct})"),
                ));
            }
        }
        Ok(())
    }
}

/// Machine-readable remarks attached to a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantFlag {
    /// No candidate reached the threshold; the closest one was kept.
    ThresholdNotMet,
    /// No candidate produced any energy.
    NoProduction,
    /// No candidate fell within the NPV autoconsumption window.
    NpvConstraintRelaxed,
    BessDisabled,
}

/// A selected system configuration. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub kind: VariantKind,
    pub scenario: CapacityScenario,
    pub result: SimulationResult,
    /// Same capacity without battery.
    pub baseline: SimulationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_pct: Option<f64>,
    pub meets_threshold: bool,
    pub autoconsumption_pct: Option<f64>,
    pub coverage_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economics: Option<EconomicSummary>,
    #[serde(default)]
    pub flags: Vec<VariantFlag>,
}

impl Variant {
    pub fn from_scenario(
        kind: VariantKind,
        scenario: &ScenarioResult,
        threshold_pct: Option<f64>,
        meets_threshold: bool,
        mut flags: Vec<VariantFlag>,
    ) -> Self {
        if matches!(scenario.result.bess, BessStatus::Disabled { .. }) {
            flags.push(VariantFlag::BessDisabled);
        }
        Self {
            kind,
            scenario: scenario.scenario.clone(),
            result: scenario.result.clone(),
            baseline: scenario.baseline_or_self().clone(),
            threshold_pct,
            meets_threshold,
            autoconsumption_pct: scenario.autoconsumption_pct,
            coverage_pct: scenario.coverage_pct,
            economics: scenario.economics.clone(),
            flags,
        }
    }
}

/// Index of the scenario representing threshold `tau` and whether it meets it.
///
/// `scenarios` is in sweep order (ascending capacity), so the first candidate
/// with autoconsumption >= `tau` is the smallest capacity meeting it. When
/// none reaches `tau`, the candidate with the highest autoconsumption is
/// returned with `false`. Candidates without production are skipped; `None`
/// only when every candidate lacks production.
pub fn select_threshold(scenarios: &[ScenarioResult], tau: f64) -> Option<(usize, bool)> {
    let mut closest_below: Option<(usize, f64)> = None;

    for (i, s) in scenarios.iter().enumerate() {
        let Some(a) = s.autoconsumption_pct else {
            continue;
        };
        if a >= tau {
            return Some((i, true));
        }
        if closest_below.is_none_or(|(_, best)| a > best) {
            closest_below = Some((i, a));
        }
    }

    closest_below.map(|(i, _)| (i, false))
}

/// Builds the threshold variant for `kind`.
pub fn threshold_variant(scenarios: &[ScenarioResult], kind: VariantKind, tau: f64) -> Option<Variant> {
    let first = scenarios.first()?;
    let variant = match select_threshold(scenarios, tau) {
        Some((i, true)) => Variant::from_scenario(kind, &scenarios[i], Some(tau), true, Vec::new()),
        Some((i, false)) => {
            warn!(
                variant = kind.label(),
                threshold_pct = tau,
                best_pct = scenarios[i].autoconsumption_pct,
                "no capacity meets threshold, keeping closest candidate"
            );
            Variant::from_scenario(
                kind,
                &scenarios[i],
                Some(tau),
                false,
                vec![VariantFlag::ThresholdNotMet],
            )
        }
        None => {
            warn!(variant = kind.label(), "no candidate produces energy");
            Variant::from_scenario(
                kind,
                first,
                Some(tau),
                false,
                vec![VariantFlag::ThresholdNotMet, VariantFlag::NoProduction],
            )
        }
    };
    info!(
        variant = kind.label(),
        capacity_kwp = variant.scenario.capacity_kwp,
        meets_threshold = variant.meets_threshold,
        "selected threshold variant"
    );
    Some(variant)
}

/// Index of the NPV-maximizing scenario among those passing `filter`.
/// Equal NPVs resolve to the earliest candidate.
fn best_npv(scenarios: &[ScenarioResult], filter: impl Fn(&ScenarioResult) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, s) in scenarios.iter().enumerate() {
        let Some(npv) = s.npv() else { continue };
        if !filter(s) {
            continue;
        }
        if best.is_none_or(|(_, b)| npv.total_cmp(&b).is_gt()) {
            best = Some((i, npv));
        }
    }
    best.map(|(i, _)| i)
}

/// Builds the NPV-optimal variant; `None` when no scenario carries economics.
pub fn npv_variant(scenarios: &[ScenarioResult], mode: NpvMode) -> Option<Variant> {
    let (index, flags) = match mode {
        NpvMode::Unconstrained => (best_npv(scenarios, |_| true)?, Vec::new()),
        NpvMode::Constrained { low_pct, high_pct } => {
            let within = best_npv(scenarios, |s| {
                s.autoconsumption_pct
                    .is_some_and(|a| (low_pct..=high_pct).contains(&a))
            });
            match within {
                Some(i) => (i, Vec::new()),
                None => {
                    warn!(
                        low_pct,
                        high_pct, "no candidate within NPV autoconsumption window, using global maximum"
                    );
                    (
                        best_npv(scenarios, |_| true)?,
                        vec![VariantFlag::NpvConstraintRelaxed],
                    )
                }
            }
        }
    };
    let variant = Variant::from_scenario(VariantKind::NpvOptimal, &scenarios[index], None, true, flags);
    info!(
        capacity_kwp = variant.scenario.capacity_kwp,
        npv = variant.economics.as_ref().map(|e| e.npv),
        "selected NPV variant"
    );
    Some(variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::ExportMode;

    fn scenario(capacity: f64, autoconsumption: Option<f64>, npv: Option<f64>) -> ScenarioResult {
        let production = if autoconsumption.is_some() { 100.0 } else { 0.0 };
        let result = SimulationResult {
            production_kwh: production,
            consumption_kwh: 1000.0,
            self_consumed_kwh: autoconsumption.unwrap_or(0.0),
            direct_kwh: autoconsumption.unwrap_or(0.0),
            exported_kwh: 0.0,
            imported_kwh: 0.0,
            charged_kwh: 0.0,
            discharged_kwh: 0.0,
            curtailed_kwh: 0.0,
            equivalent_full_cycles: 0.0,
            export_mode: ExportMode::Allowed,
            bess: BessStatus::NotConfigured,
            monthly_production_kwh: [0.0; 12],
            monthly_self_consumed_kwh: [0.0; 12],
            monthly_discharged_kwh: [0.0; 12],
        };
        ScenarioResult {
            scenario: CapacityScenario::pv_only(capacity, 1.2),
            result,
            baseline: None,
            autoconsumption_pct: autoconsumption,
            coverage_pct: Some(1.0),
            economics: npv.map(|npv| EconomicSummary {
                capex: 0.0,
                npv,
                irr: crate::finance::Irr::Undefined {
                    reason: "test".into(),
                },
                lcoe_per_mwh: None,
                payback_years: None,
            }),
        }
    }

    fn sweep() -> Vec<ScenarioResult> {
        vec![
            scenario(0.0, None, Some(0.0)),
            scenario(10.0, Some(99.0), Some(100.0)),
            scenario(20.0, Some(96.0), Some(300.0)),
            scenario(30.0, Some(91.0), Some(300.0)),
            scenario(40.0, Some(84.0), Some(250.0)),
        ]
    }

    #[test]
    fn picks_smallest_capacity_meeting_threshold() {
        assert_eq!(select_threshold(&sweep(), 95.0), Some((1, true)));
        assert_eq!(select_threshold(&sweep(), 90.0), Some((1, true)));
        assert_eq!(select_threshold(&sweep(), 99.0), Some((1, true)));
    }

    #[test]
    fn smallest_capacity_wins_even_when_a_larger_one_is_closer_to_threshold() {
        let s = vec![
            scenario(0.0, None, None),
            scenario(10.0, Some(100.0), None),
            scenario(60.0, Some(98.7), None),
            scenario(90.0, Some(94.0), None),
        ];
        let v = threshold_variant(&s, VariantKind::A, 95.0).expect("variant");
        assert!(v.meets_threshold);
        assert_eq!(v.scenario.capacity_kwp, 10.0);
    }

    #[test]
    fn unmet_threshold_keeps_closest_flagged() {
        let v = threshold_variant(&sweep(), VariantKind::A, 99.5).expect("variant");
        assert!(!v.meets_threshold);
        assert_eq!(v.scenario.capacity_kwp, 10.0);
        assert!(v.flags.contains(&VariantFlag::ThresholdNotMet));
    }

    #[test]
    fn equal_autoconsumption_prefers_smaller_capacity() {
        let s = vec![scenario(10.0, Some(92.0), None), scenario(20.0, Some(92.0), None)];
        assert_eq!(select_threshold(&s, 90.0), Some((0, true)));
        assert_eq!(select_threshold(&s, 95.0), Some((0, false)));
    }

    #[test]
    fn selection_is_idempotent() {
        let s = sweep();
        let a = threshold_variant(&s, VariantKind::B, 90.0);
        let b = threshold_variant(&s, VariantKind::B, 90.0);
        assert_eq!(a, b);
    }

    #[test]
    fn all_zero_production_is_flagged() {
        let s = vec![scenario(0.0, None, None)];
        let v = threshold_variant(&s, VariantKind::D, 80.0).expect("variant");
        assert!(v.flags.contains(&VariantFlag::NoProduction));
        assert!(threshold_variant(&[], VariantKind::D, 80.0).is_none());
    }

    #[test]
    fn npv_ties_resolve_to_smaller_capacity() {
        let v = npv_variant(&sweep(), NpvMode::Unconstrained).expect("variant");
        assert_eq!(v.scenario.capacity_kwp, 20.0);
    }

    #[test]
    fn constrained_npv_respects_window() {
        let v = npv_variant(
            &sweep(),
            NpvMode::Constrained {
                low_pct: 80.0,
                high_pct: 90.0,
            },
        )
        .expect("variant");
        assert_eq!(v.scenario.capacity_kwp, 40.0);
        assert!(v.flags.is_empty());
    }

    #[test]
    fn empty_window_falls_back_flagged() {
        let v = npv_variant(
            &sweep(),
            NpvMode::Constrained {
                low_pct: 10.0,
                high_pct: 20.0,
            },
        )
        .expect("variant");
        assert_eq!(v.scenario.capacity_kwp, 20.0);
        assert!(v.flags.contains(&VariantFlag::NpvConstraintRelaxed));
    }

    #[test]
    fn variant_kinds_order_as_map_keys() {
        let mut kinds = vec![VariantKind::NpvOptimal, VariantKind::C, VariantKind::A];
        kinds.sort();
        assert_eq!(kinds, vec![VariantKind::A, VariantKind::C, VariantKind::NpvOptimal]);
    }
}
