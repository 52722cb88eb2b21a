//! Parallel evaluation of every candidate system size.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::grid::{CancelToken, CapacityRange};
use crate::error::{EngineError, Result, ensure_positive};
use crate::finance::{FinancialParameters, FinancialResult, Irr, evaluate};
use crate::series::TimeSeries;
use crate::sim::dispatch::simulate;
use crate::sim::types::{BessConfig, CapacityScenario, ExportMode, SimulationResult};
use crate::solar::production::{ProductionProfileGenerator, UnitProfile};
use crate::solar::site::{LossFactors, SiteConfig};

/// Battery sizes to combine with every PV capacity.
///
/// Each (power, energy) pair of the cartesian product becomes one candidate.
/// Efficiency, SoC window and fade come from `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BessSweep {
    pub power_kw: Vec<f64>,
    pub energy_kwh: Vec<f64>,
    #[serde(default)]
    pub parameters: BessConfig,
}

impl BessSweep {
    /// A sweep over exactly one battery size.
    pub fn single(config: BessConfig) -> Self {
        Self {
            power_kw: vec![config.power_kw],
            energy_kwh: vec![config.energy_kwh],
            parameters: config,
        }
    }

    /// # Errors
    ///
    /// Returns `EngineError::Input` for empty lists or malformed parameters.
    pub fn validate(&self) -> Result<()> {
        if self.power_kw.is_empty() {
            return Err(EngineError::input("bess.power_kw", "at least one value required"));
        }
        if self.energy_kwh.is_empty() {
            return Err(EngineError::input("bess.energy_kwh", "at least one value required"));
        }
        for config in self.configs() {
            config.validate()?;
        }
        Ok(())
    }

    /// Battery configurations in power-major order.
    pub fn configs(&self) -> Vec<BessConfig> {
        self.power_kw
            .iter()
            .flat_map(|p| {
                self.energy_kwh.iter().map(move |e| BessConfig {
                    power_kw: *p,
                    energy_kwh: *e,
                    ..self.parameters.clone()
                })
            })
            .collect()
    }
}

/// Headline economics of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicSummary {
    pub capex: f64,
    pub npv: f64,
    pub irr: Irr,
    pub lcoe_per_mwh: Option<f64>,
    pub payback_years: Option<f64>,
}

impl From<&FinancialResult> for EconomicSummary {
    fn from(r: &FinancialResult) -> Self {
        Self {
            capex: r.capex,
            npv: r.npv,
            irr: r.irr.clone(),
            lcoe_per_mwh: r.lcoe_per_mwh,
            payback_years: r.payback_years,
        }
    }
}

/// Dispatch outcome of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: CapacityScenario,
    pub result: SimulationResult,
    /// PV-only run at the same capacity; present for battery candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<SimulationResult>,
    /// `self / production`, %; `None` without production.
    pub autoconsumption_pct: Option<f64>,
    /// `self / consumption`, %.
    pub coverage_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economics: Option<EconomicSummary>,
}

impl ScenarioResult {
    pub(crate) fn new(
        scenario: CapacityScenario,
        result: SimulationResult,
        baseline: Option<SimulationResult>,
        finance: Option<&FinancialParameters>,
    ) -> Result<Self> {
        let economics = finance
            .map(|params| evaluate(&scenario, &result, baseline.as_ref(), params))
            .transpose()?
            .as_ref()
            .map(EconomicSummary::from);
        Ok(Self {
            autoconsumption_pct: result.autoconsumption_pct(),
            coverage_pct: result.coverage_pct(),
            scenario,
            result,
            baseline,
            economics,
        })
    }

    pub fn capacity_kwp(&self) -> f64 {
        self.scenario.capacity_kwp
    }

    pub fn npv(&self) -> Option<f64> {
        self.economics.as_ref().map(|e| e.npv)
    }

    /// The PV-only result for this capacity.
    pub fn baseline_or_self(&self) -> &SimulationResult {
        self.baseline.as_ref().unwrap_or(&self.result)
    }
}

/// Everything one sweep needs besides the grid.
#[derive(Debug, Clone)]
pub struct SweepInput<'a> {
    pub consumption: &'a TimeSeries,
    pub site: &'a SiteConfig,
    pub losses: &'a LossFactors,
    pub dcac_ratio: f64,
    pub export_mode: ExportMode,
    pub bess: Option<&'a BessSweep>,
    pub finance: Option<&'a FinancialParameters>,
}

/// Runs production and dispatch once per grid point.
///
/// Capacities are evaluated in parallel; the returned list is ordered by
/// capacity, then battery power, then battery energy, independent of
/// scheduling. The token is checked before every capacity.
///
/// # Errors
///
/// Returns `EngineError::Input` for malformed inputs and
/// `EngineError::Cancelled` when `cancel` fires mid-sweep.
pub fn run_sweep(
    input: &SweepInput<'_>,
    range: &CapacityRange,
    cancel: &CancelToken,
) -> Result<Vec<ScenarioResult>> {
    range.validate()?;
    ensure_positive("dcac_ratio", input.dcac_ratio)?;
    if let Some(bess) = input.bess {
        bess.validate()?;
    }
    if let Some(params) = input.finance {
        params.validate()?;
    }

    let generator = ProductionProfileGenerator::new(input.site.clone(), input.losses.clone())?;
    let unit = generator.unit_profile(input.consumption.timestamps());
    let capacities = range.capacities();
    let bess_configs = input.bess.map(BessSweep::configs);

    info!(
        candidates = capacities.len() * bess_configs.as_ref().map_or(1, Vec::len),
        min_kwp = range.min_kwp,
        max_kwp = range.max_kwp,
        step_kwp = range.step_kwp,
        "starting capacity sweep"
    );

    let nested = capacities
        .into_par_iter()
        .map(|capacity| {
            cancel.check()?;
            evaluate_capacity(input, &unit, capacity, bess_configs.as_deref())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(nested.into_iter().flatten().collect())
}

fn evaluate_capacity(
    input: &SweepInput<'_>,
    unit: &UnitProfile,
    capacity_kwp: f64,
    bess_configs: Option<&[BessConfig]>,
) -> Result<Vec<ScenarioResult>> {
    let production = unit.production(capacity_kwp, input.dcac_ratio)?;
    let pv_only = simulate(&production, input.consumption, None, input.export_mode)?;
    debug!(
        capacity_kwp,
        production_kwh = pv_only.production_kwh,
        self_consumed_kwh = pv_only.self_consumed_kwh,
        "evaluated PV-only candidate"
    );

    let Some(configs) = bess_configs else {
        let scenario = CapacityScenario::pv_only(capacity_kwp, input.dcac_ratio);
        return Ok(vec![ScenarioResult::new(scenario, pv_only, None, input.finance)?]);
    };

    configs
        .iter()
        .map(|config| {
            let result = simulate(&production, input.consumption, Some(config), input.export_mode)?;
            debug!(
                capacity_kwp,
                power_kw = config.power_kw,
                energy_kwh = config.energy_kwh,
                self_consumed_kwh = result.self_consumed_kwh,
                "evaluated battery candidate"
            );
            let scenario = CapacityScenario {
                capacity_kwp,
                dcac_ratio: input.dcac_ratio,
                bess: Some(config.clone()),
            };
            ScenarioResult::new(scenario, result, Some(pv_only.clone()), input.finance)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::HOURS_PER_YEAR;

    fn consumption() -> TimeSeries {
        TimeSeries::for_year(2023, vec![20.0; HOURS_PER_YEAR]).expect("valid")
    }

    fn input<'a>(
        consumption: &'a TimeSeries,
        site: &'a SiteConfig,
        losses: &'a LossFactors,
    ) -> SweepInput<'a> {
        SweepInput {
            consumption,
            site,
            losses,
            dcac_ratio: 1.2,
            export_mode: ExportMode::Allowed,
            bess: None,
            finance: None,
        }
    }

    fn range() -> CapacityRange {
        CapacityRange {
            min_kwp: 0.0,
            max_kwp: 200.0,
            step_kwp: 50.0,
        }
    }

    #[test]
    fn results_are_ordered_and_monotone() {
        let (c, site, losses) = (consumption(), SiteConfig::default(), LossFactors::default());
        let out = run_sweep(&input(&c, &site, &losses), &range(), &CancelToken::new()).expect("valid");
        let caps: Vec<f64> = out.iter().map(ScenarioResult::capacity_kwp).collect();
        assert_eq!(caps, vec![0.0, 50.0, 100.0, 150.0, 200.0]);
        for pair in out.windows(2) {
            assert!(pair[1].result.production_kwh >= pair[0].result.production_kwh);
            assert!(pair[1].coverage_pct >= pair[0].coverage_pct);
        }
        assert_eq!(out[0].autoconsumption_pct, None);
    }

    #[test]
    fn battery_grid_is_cartesian() {
        let (c, site, losses) = (consumption(), SiteConfig::default(), LossFactors::default());
        let bess = BessSweep {
            power_kw: vec![10.0, 20.0],
            energy_kwh: vec![20.0, 40.0, 80.0],
            parameters: BessConfig::default(),
        };
        let mut inp = input(&c, &site, &losses);
        inp.bess = Some(&bess);
        let out = run_sweep(&inp, &range(), &CancelToken::new()).expect("valid");
        assert_eq!(out.len(), 5 * 6);
        assert!(out.iter().all(|s| s.baseline.is_some()));
        let first = out[6].scenario.bess.as_ref().expect("battery");
        assert_eq!((first.power_kw, first.energy_kwh), (10.0, 20.0));
    }

    #[test]
    fn cancelled_token_stops_sweep() {
        let (c, site, losses) = (consumption(), SiteConfig::default(), LossFactors::default());
        let token = CancelToken::new();
        token.cancel();
        let err = run_sweep(&input(&c, &site, &losses), &range(), &token).expect_err("must cancel");
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn finance_attaches_economics() {
        let (c, site, losses) = (consumption(), SiteConfig::default(), LossFactors::default());
        let params = FinancialParameters::default();
        let mut inp = input(&c, &site, &losses);
        inp.finance = Some(&params);
        let out = run_sweep(&inp, &range(), &CancelToken::new()).expect("valid");
        assert!(out.iter().all(|s| s.economics.is_some()));
        assert_eq!(out[0].npv(), Some(0.0));
    }
}
