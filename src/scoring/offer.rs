//! Offers: the KPIs of one candidate system as the scoring engine sees them.

use serde::{Deserialize, Serialize};

use crate::finance::FinancialResult;
use crate::optimize::variants::Variant;
use crate::sim::types::SimulationResult;

/// Grid emission factor used when the caller gives none, kg CO2 per kWh.
pub const DEFAULT_EMISSION_FACTOR_KG_PER_KWH: f64 = 0.7;

/// Annual CO2 avoided by a system, tonnes.
///
/// Self-consumed and exported energy both displace grid generation.
pub fn co2_reduction_tonnes(result: &SimulationResult, emission_factor_kg_per_kwh: f64) -> f64 {
    (result.self_consumed_kwh + result.exported_kwh) * emission_factor_kg_per_kwh / 1000.0
}

/// One offer to rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Offer {
    pub id: String,
    pub capex: f64,
    pub npv: f64,
    /// `None` when the IRR is undefined.
    #[serde(default)]
    pub irr: Option<f64>,
    #[serde(default)]
    pub payback_years: Option<f64>,
    #[serde(default)]
    pub lcoe_per_mwh: Option<f64>,
    #[serde(default)]
    pub autoconsumption_pct: Option<f64>,
    #[serde(default)]
    pub coverage_pct: Option<f64>,
    /// Tonnes per year.
    #[serde(default)]
    pub co2_reduction_t: f64,
    /// First-year savings plus export revenue.
    #[serde(default)]
    pub annual_revenue: f64,
    #[serde(default)]
    pub annual_opex: f64,
    #[serde(default = "default_meets_threshold")]
    pub meets_threshold: bool,
}

fn default_meets_threshold() -> bool {
    true
}

impl Offer {
    /// Builds an offer from an engine variant and its financial evaluation.
    pub fn from_variant(
        id: impl Into<String>,
        variant: &Variant,
        finance: &FinancialResult,
        emission_factor_kg_per_kwh: f64,
    ) -> Self {
        let first = finance.annual.first();
        Self {
            id: id.into(),
            capex: finance.capex,
            npv: finance.npv,
            irr: finance.irr.rate(),
            payback_years: finance.payback_years,
            lcoe_per_mwh: finance.lcoe_per_mwh,
            autoconsumption_pct: variant.autoconsumption_pct,
            coverage_pct: variant.coverage_pct,
            co2_reduction_t: co2_reduction_tonnes(&variant.result, emission_factor_kg_per_kwh),
            annual_revenue: first.map_or(0.0, |y| y.savings + y.export_revenue),
            annual_opex: first.map_or(0.0, |y| y.opex),
            meets_threshold: variant.meets_threshold,
        }
    }
}
