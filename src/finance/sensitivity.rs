//! One-at-a-time sensitivity of NPV and IRR to financial assumptions.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::EconomicsRequest;
use super::cashflow::{FinancialResult, evaluate};
use super::metrics::Irr;
use super::params::FinancialParameters;
use crate::error::{EngineError, Result, ensure_in_range};

/// Default symmetric variation, %.
pub const DEFAULT_VARIATION_PCT: f64 = 20.0;
/// Points per parameter in the robustness sweep (including both ends).
const ROBUSTNESS_STEPS: usize = 5;

/// An assumption that can be varied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityParameter {
    EnergyPrice,
    Capex,
    FeedInTariff,
    DiscountRate,
    DegradationRate,
    Opex,
}

impl SensitivityParameter {
    pub const ALL: [SensitivityParameter; 6] = [
        SensitivityParameter::EnergyPrice,
        SensitivityParameter::Capex,
        SensitivityParameter::FeedInTariff,
        SensitivityParameter::DiscountRate,
        SensitivityParameter::DegradationRate,
        SensitivityParameter::Opex,
    ];

    /// Base value of this parameter in `params`.
    pub fn value(self, params: &FinancialParameters) -> f64 {
        match self {
            SensitivityParameter::EnergyPrice => params.energy_price_per_mwh,
            SensitivityParameter::Capex => params.capex_tiers.first().map_or(0.0, |t| t.per_kwp),
            SensitivityParameter::FeedInTariff => params.feed_in_tariff_per_mwh,
            SensitivityParameter::DiscountRate => params.discount_rate,
            SensitivityParameter::DegradationRate => params.degradation_rate,
            SensitivityParameter::Opex => params.opex_pct,
        }
    }

    /// Copy of `params` with this parameter scaled by `factor`.
    ///
    /// CAPEX scales every PV band and the battery unit costs together.
    pub fn apply(self, params: &FinancialParameters, factor: f64) -> FinancialParameters {
        let mut p = params.clone();
        match self {
            SensitivityParameter::EnergyPrice => p.energy_price_per_mwh *= factor,
            SensitivityParameter::Capex => {
                for tier in &mut p.capex_tiers {
                    tier.per_kwp *= factor;
                }
                p.bess.capex_per_kwh *= factor;
                p.bess.capex_per_kw *= factor;
            }
            SensitivityParameter::FeedInTariff => p.feed_in_tariff_per_mwh *= factor,
            SensitivityParameter::DiscountRate => p.discount_rate *= factor,
            SensitivityParameter::DegradationRate => p.degradation_rate *= factor,
            SensitivityParameter::Opex => {
                p.opex_pct *= factor;
                p.bess.opex_pct *= factor;
            }
        }
        p
    }
}

/// NPV and IRR at one point of the robustness sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub variation_pct: f64,
    pub npv: f64,
    pub irr: Irr,
}

/// One bar of the tornado chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TornadoBar {
    pub parameter: SensitivityParameter,
    pub base_value: f64,
    pub npv_low: f64,
    pub npv_high: f64,
    pub irr_low: Irr,
    pub irr_high: Irr,
    /// `|npv_high − npv_low|`.
    pub impact: f64,
    /// NPV stays positive over the whole variation range.
    pub robust: bool,
    pub sweep: Vec<SweepPoint>,
}

/// Tornado data for a set of parameters, bars sorted by descending impact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityReport {
    pub base_npv: f64,
    pub base_irr: Irr,
    pub variation_pct: f64,
    pub bars: Vec<TornadoBar>,
    /// Every bar is robust.
    pub robust: bool,
}

/// Varies each parameter by `±variation_pct` around `request.parameters`,
/// holding the others fixed.
///
/// An empty `parameters` list analyzes every [`SensitivityParameter`].
///
/// # Errors
///
/// Returns `EngineError::Input` for a variation outside (0, 100] or when a
/// varied parameter set fails validation.
pub fn comprehensive_sensitivity(
    request: &EconomicsRequest,
    parameters: &[SensitivityParameter],
    variation_pct: f64,
) -> Result<SensitivityReport> {
    ensure_in_range("variation_range_pct", variation_pct, 0.0, 100.0)?;
    if variation_pct == 0.0 {
        return Err(EngineError::input("variation_range_pct", "must be > 0"));
    }
    let parameters = if parameters.is_empty() {
        &SensitivityParameter::ALL[..]
    } else {
        parameters
    };

    let evaluate_at = |params: &FinancialParameters| -> Result<FinancialResult> {
        evaluate(
            &request.scenario,
            &request.result,
            request.baseline.as_ref(),
            params,
        )
    };
    let base = evaluate_at(&request.parameters)?;
    let base_npv = base.npv;

    let mut bars = Vec::with_capacity(parameters.len());
    for &parameter in parameters {
        let mut sweep = Vec::with_capacity(ROBUSTNESS_STEPS);
        for i in 0..ROBUSTNESS_STEPS {
            let t = i as f64 / (ROBUSTNESS_STEPS - 1) as f64;
            let pct = -variation_pct + 2.0 * variation_pct * t;
            let out = evaluate_at(&parameter.apply(&request.parameters, 1.0 + pct / 100.0))?;
            sweep.push(SweepPoint {
                variation_pct: pct,
                npv: out.npv,
                irr: out.irr,
            });
        }
        let (low, high) = match (sweep.first(), sweep.last()) {
            (Some(low), Some(high)) => (low.clone(), high.clone()),
            _ => return Err(EngineError::input("variation_range_pct", "empty sweep")),
        };
        bars.push(TornadoBar {
            parameter,
            base_value: parameter.value(&request.parameters),
            npv_low: low.npv,
            npv_high: high.npv,
            irr_low: low.irr,
            irr_high: high.irr,
            impact: (high.npv - low.npv).abs(),
            robust: sweep.iter().all(|s| s.npv > 0.0),
            sweep,
        });
    }
    bars.sort_by(|a, b| b.impact.total_cmp(&a.impact));

    let robust = bars.iter().all(|b| b.robust);
    info!(
        base_npv,
        variation_pct,
        parameters = bars.len(),
        robust,
        "sensitivity analysis complete"
    );

    Ok(SensitivityReport {
        base_npv,
        base_irr: base.irr,
        variation_pct,
        bars,
        robust,
    })
}
