//! Multi-year cash-flow projection for one system variant.

use serde::Serialize;
use tracing::{debug, warn};

use super::metrics::{Irr, discounted_payback_years, irr, npv, payback_years};
use super::params::FinancialParameters;
use crate::error::Result;
use crate::sim::dispatch::estimate_baseline_without_bess;
use crate::sim::types::{CapacityScenario, SimulationResult};

/// Flows of one project year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualCashFlow {
    pub year: u32,
    pub production_kwh: f64,
    pub self_consumed_kwh: f64,
    pub exported_kwh: f64,
    /// Remaining battery capacity fraction (1.0 without battery).
    pub bess_capacity_factor: f64,
    pub savings: f64,
    pub export_revenue: f64,
    pub opex: f64,
    pub replacement_capex: f64,
    pub net: f64,
    pub discounted_net: f64,
    pub cumulative_discounted: f64,
}

/// Outcome of the financial evaluation of one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialResult {
    pub capex: f64,
    pub pv_capex: f64,
    pub bess_capex: f64,
    pub npv: f64,
    pub irr: Irr,
    /// Levelized cost of energy, per MWh; `None` without production.
    pub lcoe_per_mwh: Option<f64>,
    pub payback_years: Option<f64>,
    pub discounted_payback_years: Option<f64>,
    /// Year-0 investment followed by one net flow per project year.
    pub cash_flows: Vec<f64>,
    pub annual: Vec<AnnualCashFlow>,
    pub replacement_years: Vec<u32>,
}

/// Projects the cash flows of `scenario` and derives NPV, IRR, LCOE and payback.
///
/// Year `y` self-consumption is
/// `(baseline + (with_bess − baseline) × bess_factor(y)) × (1 − d)^(y−1)`,
/// i.e. the battery's contribution fades with its capacity while the whole
/// system fades with PV degradation `d`. Exports follow the same rule.
/// With no active battery the baseline is the result itself.
///
/// # Errors
///
/// Returns `EngineError::Input` when the parameters fail validation.
pub fn evaluate(
    scenario: &CapacityScenario,
    result: &SimulationResult,
    baseline: Option<&SimulationResult>,
    params: &FinancialParameters,
) -> Result<FinancialResult> {
    params.validate()?;

    let active_bess = scenario.bess.as_ref().filter(|_| result.has_active_bess());
    let estimated;
    let baseline = match (active_bess, baseline) {
        (None, _) => result,
        (Some(_), Some(b)) => b,
        (Some(_), None) => {
            estimated = estimate_baseline_without_bess(result);
            &estimated
        }
    };

    let pv_capex = params.pv_capex(scenario.capacity_kwp);
    let bess_capex = active_bess.map_or(0.0, |b| params.bess_capex(b));
    let capex = pv_capex + bess_capex;
    let annual_opex = pv_capex * params.opex_pct / 100.0 + bess_capex * params.bess.opex_pct / 100.0;
    let replacement_cost = bess_capex * params.bess.replacement_cost_pct / 100.0;

    let trajectory = active_bess.map(|b| b.degradation.trajectory(params.horizon_years));
    let replacement_years = trajectory
        .as_ref()
        .map(|t| t.replacement_years.clone())
        .unwrap_or_default();

    let mut cash_flows = Vec::with_capacity(params.horizon_years as usize + 1);
    cash_flows.push(-capex);
    let mut annual = Vec::with_capacity(params.horizon_years as usize);
    let mut cumulative_discounted = -capex;
    let mut discounted_cost = capex;
    let mut discounted_production = 0.0;

    for year in 1..=params.horizon_years {
        let pv_factor = (1.0 - params.degradation_rate).powi(year as i32 - 1);
        let bess_factor = trajectory.as_ref().map_or(1.0, |t| t.factor(year));
        let blend = |with: f64, without: f64| (without + (with - without) * bess_factor) * pv_factor;

        let production_kwh = result.production_kwh * pv_factor;
        let self_consumed_kwh = blend(result.self_consumed_kwh, baseline.self_consumed_kwh);
        let exported_kwh = blend(result.exported_kwh, baseline.exported_kwh);

        let savings = self_consumed_kwh * params.energy_price_per_kwh(year);
        let export_revenue = exported_kwh * params.feed_in_per_kwh(year);
        let replacement_capex = if replacement_years.contains(&year) {
            replacement_cost
        } else {
            0.0
        };
        let net = savings + export_revenue - annual_opex - replacement_capex;
        let discount = params.discount(year);
        cumulative_discounted += net * discount;
        discounted_cost += (annual_opex + replacement_capex) * discount;
        discounted_production += production_kwh * discount;

        cash_flows.push(net);
        annual.push(AnnualCashFlow {
            year,
            production_kwh,
            self_consumed_kwh,
            exported_kwh,
            bess_capacity_factor: bess_factor,
            savings,
            export_revenue,
            opex: annual_opex,
            replacement_capex,
            net,
            discounted_net: net * discount,
            cumulative_discounted,
        });
    }

    let npv_value = npv(&cash_flows, params.discount_rate);
    let irr_value = irr(&cash_flows);
    if let Irr::Undefined { reason } = &irr_value {
        warn!(capacity_kwp = scenario.capacity_kwp, %reason, "IRR undefined");
    }
    let lcoe_per_mwh =
        (discounted_production > 0.0).then(|| 1000.0 * discounted_cost / discounted_production);

    debug!(
        capacity_kwp = scenario.capacity_kwp,
        capex,
        npv = npv_value,
        "evaluated cash flows"
    );

    Ok(FinancialResult {
        capex,
        pv_capex,
        bess_capex,
        npv: npv_value,
        irr: irr_value,
        lcoe_per_mwh,
        payback_years: payback_years(&cash_flows),
        discounted_payback_years: discounted_payback_years(&cash_flows, params.discount_rate),
        cash_flows,
        annual,
        replacement_years,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::{BessConfig, BessStatus, ExportMode};

    fn result(production: f64, self_consumed: f64) -> SimulationResult {
        SimulationResult {
            production_kwh: production,
            consumption_kwh: self_consumed * 2.0,
            self_consumed_kwh: self_consumed,
            direct_kwh: self_consumed,
            exported_kwh: production - self_consumed,
            imported_kwh: self_consumed,
            charged_kwh: 0.0,
            discharged_kwh: 0.0,
            curtailed_kwh: 0.0,
            equivalent_full_cycles: 0.0,
            export_mode: ExportMode::Allowed,
            bess: BessStatus::NotConfigured,
            monthly_production_kwh: [0.0; 12],
            monthly_self_consumed_kwh: [0.0; 12],
            monthly_discharged_kwh: [0.0; 12],
        }
    }

    fn flat_params() -> FinancialParameters {
        FinancialParameters {
            energy_price_per_mwh: 1000.0,
            capex_tiers: vec![crate::finance::params::CapexTier {
                max_kwp: None,
                per_kwp: 1000.0,
            }],
            opex_pct: 0.0,
            discount_rate: 0.0,
            degradation_rate: 0.0,
            horizon_years: 10,
            ..FinancialParameters::default()
        }
    }

    #[test]
    fn zero_horizon_npv_is_minus_capex() {
        let params = FinancialParameters {
            horizon_years: 0,
            ..FinancialParameters::default()
        };
        let scenario = CapacityScenario::pv_only(100.0, 1.2);
        let out = evaluate(&scenario, &result(100_000.0, 60_000.0), None, &params).expect("valid");
        assert_eq!(out.npv, -params.pv_capex(100.0));
        assert_eq!(out.npv, -out.capex);
        assert!(out.annual.is_empty());
    }

    #[test]
    fn undiscounted_flat_project() {
        // 10 kWp at 1000/kWp, 2 MWh self-consumed at 1/kWh for 10 years.
        let scenario = CapacityScenario::pv_only(10.0, 1.2);
        let out = evaluate(&scenario, &result(10_000.0, 2_000.0), None, &flat_params()).expect("valid");
        assert_eq!(out.capex, 10_000.0);
        assert!((out.npv - 10_000.0).abs() < 1e-6);
        assert_eq!(out.payback_years, Some(5.0));
        assert!(out.irr.is_defined());
        // 10 000 cost over 100 MWh.
        assert!((out.lcoe_per_mwh.unwrap_or_default() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_capacity_has_zero_npv() {
        let scenario = CapacityScenario::pv_only(0.0, 1.2);
        let out = evaluate(&scenario, &result(0.0, 0.0), None, &FinancialParameters::default())
            .expect("valid");
        assert_eq!(out.npv, 0.0);
        assert_eq!(out.lcoe_per_mwh, None);
        assert!(!out.irr.is_defined());
    }

    #[test]
    fn unprofitable_project_has_undefined_irr() {
        let params = FinancialParameters {
            energy_price_per_mwh: 0.0,
            ..flat_params()
        };
        let scenario = CapacityScenario::pv_only(10.0, 1.2);
        let out = evaluate(&scenario, &result(10_000.0, 2_000.0), None, &params).expect("valid");
        assert!(!out.irr.is_defined());
        assert_eq!(out.payback_years, None);
    }

    #[test]
    fn degradation_reduces_later_savings() {
        let params = FinancialParameters {
            degradation_rate: 0.01,
            ..flat_params()
        };
        let scenario = CapacityScenario::pv_only(10.0, 1.2);
        let out = evaluate(&scenario, &result(10_000.0, 2_000.0), None, &params).expect("valid");
        assert!(out.annual[9].savings < out.annual[0].savings);
        assert!((out.annual[1].self_consumed_kwh - 1_980.0).abs() < 1e-9);
    }

    #[test]
    fn battery_replacement_is_charged_in_end_of_life_year() {
        let mut bess = BessConfig::new(10.0, 20.0);
        bess.degradation.year1_pct = 5.0;
        bess.degradation.annual_pct = 5.0;
        let scenario = CapacityScenario {
            capacity_kwp: 10.0,
            dcac_ratio: 1.2,
            bess: Some(bess.clone()),
        };
        let mut with = result(10_000.0, 3_000.0);
        with.bess = BessStatus::Active;
        with.discharged_kwh = 1_000.0;
        with.charged_kwh = 1_100.0;
        with.direct_kwh = 2_000.0;
        let params = flat_params();
        let out = evaluate(&scenario, &with, None, &params).expect("valid");
        assert_eq!(out.replacement_years, vec![5]);
        assert!(out.annual[4].replacement_capex > 0.0);
        assert_eq!(out.bess_capex, params.bess_capex(&bess));
        // Battery share fades: year 2 holds less self-consumption than year 1.
        assert!(out.annual[1].self_consumed_kwh < out.annual[0].self_consumed_kwh);
    }
}
