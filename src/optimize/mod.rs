//! Capacity sweeps and variant selection.

pub mod grid;
pub mod seasonality;
pub mod sweep;
pub mod variants;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::finance::FinancialParameters;
use crate::series::TimeSeries;
use crate::sim::types::ExportMode;
use crate::solar::site::{LossFactors, SiteConfig};

pub use grid::{CancelToken, CapacityRange, MAX_GRID_POINTS};
pub use seasonality::{
    BandValues, SeasonBand, SeasonalConfiguration, SeasonalityObjective, SeasonalityRequest,
    SeasonalityResponse, TypicalDay, derive_bands, optimize_seasonality, typical_days,
};
pub use sweep::{BessSweep, EconomicSummary, ScenarioResult, SweepInput, run_sweep};
pub use variants::{
    NpvMode, Thresholds, Variant, VariantFlag, VariantKind, npv_variant, select_threshold,
    threshold_variant,
};

/// Inputs of [`analyze`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub losses: LossFactors,
    /// Archetype default when absent.
    #[serde(default)]
    pub dcac_ratio: Option<f64>,
    pub consumption: TimeSeries,
    pub capacity: CapacityRange,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub bess: Option<BessSweep>,
    #[serde(default)]
    pub export_mode: ExportMode,
    /// Enables economics per scenario and the NPV variant.
    #[serde(default)]
    pub finance: Option<FinancialParameters>,
    /// NPV selection rule; unconstrained when absent.
    #[serde(default)]
    pub npv_mode: Option<NpvMode>,
}

impl AnalyzeRequest {
    pub fn dcac_ratio(&self) -> f64 {
        self.dcac_ratio
            .unwrap_or_else(|| self.site.archetype.default_dcac_ratio())
    }

    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first malformed field.
    pub fn validate(&self) -> Result<()> {
        self.consumption.ensure_one_year("consumption")?;
        self.site.validate()?;
        self.losses.validate()?;
        self.thresholds.validate()?;
        if let Some(mode) = &self.npv_mode {
            mode.validate()?;
        }
        if self.npv_mode.is_some() && self.finance.is_none() {
            return Err(EngineError::input("finance", "required for npv_mode"));
        }
        Ok(())
    }
}

/// Every evaluated scenario plus the representative variants.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub scenarios: Vec<ScenarioResult>,
    pub key_variants: BTreeMap<VariantKind, Variant>,
}

/// Runs the capacity sweep and selects variants A-D, plus the NPV variant
/// when financial parameters are given.
///
/// # Errors
///
/// Returns `EngineError::Input` for malformed requests and
/// `EngineError::Cancelled` when `cancel` fires.
pub fn analyze(request: &AnalyzeRequest, cancel: &CancelToken) -> Result<AnalyzeResponse> {
    request.validate()?;

    let input = SweepInput {
        consumption: &request.consumption,
        site: &request.site,
        losses: &request.losses,
        dcac_ratio: request.dcac_ratio(),
        export_mode: request.export_mode,
        bess: request.bess.as_ref(),
        finance: request.finance.as_ref(),
    };
    let scenarios = run_sweep(&input, &request.capacity, cancel)?;

    let mut key_variants = BTreeMap::new();
    for (kind, tau) in request.thresholds.pairs() {
        if let Some(v) = threshold_variant(&scenarios, kind, tau) {
            key_variants.insert(kind, v);
        }
    }
    if request.finance.is_some() {
        let mode = request.npv_mode.unwrap_or(NpvMode::Unconstrained);
        if let Some(v) = npv_variant(&scenarios, mode) {
            key_variants.insert(VariantKind::NpvOptimal, v);
        }
    }

    info!(
        scenarios = scenarios.len(),
        variants = key_variants.len(),
        "analysis complete"
    );
    Ok(AnalyzeResponse {
        scenarios,
        key_variants,
    })
}
