//! Financial evaluation of system variants: NPV, IRR, LCOE, payback and
//! sensitivity.

pub mod cashflow;
pub mod metrics;
pub mod params;
pub mod sensitivity;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sim::types::{CapacityScenario, SimulationResult};

pub use cashflow::{AnnualCashFlow, FinancialResult, evaluate};
pub use metrics::Irr;
pub use params::{BessFinance, CapexTier, FinancialParameters};
pub use sensitivity::{
    DEFAULT_VARIATION_PCT, SensitivityParameter, SensitivityReport, TornadoBar,
    comprehensive_sensitivity,
};

/// One variant's annual flows plus the assumptions to price them with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EconomicsRequest {
    pub scenario: CapacityScenario,
    pub result: SimulationResult,
    /// PV-only result for the same capacity; estimated when absent.
    #[serde(default)]
    pub baseline: Option<SimulationResult>,
    #[serde(default)]
    pub parameters: FinancialParameters,
}

/// Evaluates one variant.
///
/// # Errors
///
/// Returns `EngineError::Input` when the parameters fail validation.
pub fn analyze(request: &EconomicsRequest) -> Result<FinancialResult> {
    evaluate(
        &request.scenario,
        &request.result,
        request.baseline.as_ref(),
        &request.parameters,
    )
}
