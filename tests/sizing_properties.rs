//! End-to-end properties of the sizing pipeline: physics, dispatch,
//! sweep and finance working together.

mod common;

use chrono::NaiveDate;

use common::{default_site, flat_consumption, office_consumption, production, sweep_request};
use pv_sizer::finance::metrics::irr;
use pv_sizer::finance::{FinancialParameters, evaluate};
use pv_sizer::optimize::{BessSweep, CancelToken, analyze};
use pv_sizer::series::TimeSeries;
use pv_sizer::sim::types::{BessConfig, CapacityScenario, ExportMode};
use pv_sizer::sim::{simulate, simulate_hourly};
use pv_sizer::solar::irradiance_at;

const EPS: f64 = 1e-6;

#[test]
fn irradiance_is_exactly_zero_at_night() {
    let site = default_site();
    for (month, day) in [(1, 15), (6, 21), (12, 21)] {
        let ts = NaiveDate::from_ymd_opt(2023, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        let sample = irradiance_at(&ts, month as usize - 1, &site);
        assert!(!sample.sun.is_up());
        assert_eq!(sample.ghi(), 0.0);
        assert_eq!(sample.dni(), 0.0);
        assert_eq!(sample.dhi(), 0.0);
    }
}

#[test]
fn dispatch_conserves_energy_without_battery() {
    let prod = production(300.0);
    let cons = office_consumption(80.0, 20.0);
    let (result, hours) = simulate_hourly(&prod, &cons, None, ExportMode::Allowed).expect("run");

    for h in &hours {
        assert!(h.self_consumed() <= h.production.min(h.consumption) + EPS);
    }
    let p = prod.total();
    let c = cons.total();
    assert!((result.self_consumed_kwh + result.exported_kwh - p).abs() < EPS * p);
    assert!((result.self_consumed_kwh + result.imported_kwh - c).abs() < EPS * c);
}

#[test]
fn larger_capacity_never_lowers_production_or_coverage() {
    let request = sweep_request(office_consumption(60.0, 15.0), 0.0, 600.0, 50.0);
    let response = analyze(&request, &CancelToken::new()).expect("sweep");

    for pair in response.scenarios.windows(2) {
        assert!(pair[1].result.production_kwh >= pair[0].result.production_kwh);
        let low = pair[0].coverage_pct.unwrap_or(0.0);
        let high = pair[1].coverage_pct.unwrap_or(0.0);
        assert!(high + EPS >= low, "coverage dropped from {low} to {high}");
    }
}

#[test]
fn battery_never_returns_more_than_it_stored() {
    let prod = production(400.0);
    let cons = office_consumption(40.0, 30.0);
    let bess = BessConfig::new(100.0, 300.0);
    let result = simulate(&prod, &cons, Some(&bess), ExportMode::Allowed).expect("run");

    assert!(result.charged_kwh > 0.0);
    assert!(result.discharged_kwh > 0.0);
    assert!(result.discharged_kwh <= result.charged_kwh * bess.round_trip_efficiency + EPS);
}

#[test]
fn battery_sweep_raises_self_consumption() {
    let mut request = sweep_request(office_consumption(40.0, 30.0), 400.0, 400.0, 50.0);
    request.bess = Some(BessSweep::single(BessConfig::new(100.0, 300.0)));
    let response = analyze(&request, &CancelToken::new()).expect("sweep");

    let scenario = &response.scenarios[0];
    let baseline = scenario.baseline.as_ref().expect("baseline for battery run");
    assert!(scenario.result.self_consumed_kwh > baseline.self_consumed_kwh);
}

#[test]
fn variant_selection_is_bit_identical_on_rerun() {
    let mut request = sweep_request(office_consumption(50.0, 10.0), 0.0, 500.0, 25.0);
    request.finance = Some(FinancialParameters::default());
    let first = analyze(&request, &CancelToken::new()).expect("first run");
    let second = analyze(&request, &CancelToken::new()).expect("second run");
    assert_eq!(first.key_variants, second.key_variants);
}

#[test]
fn zero_horizon_npv_is_minus_capex() {
    let prod = production(100.0);
    let cons = flat_consumption(30.0);
    let result = simulate(&prod, &cons, None, ExportMode::Allowed).expect("run");
    let params = FinancialParameters {
        horizon_years: 0,
        ..FinancialParameters::default()
    };
    let financial = evaluate(&CapacityScenario::pv_only(100.0, 1.2), &result, None, &params)
        .expect("evaluate");
    assert!(financial.capex > 0.0);
    assert_eq!(financial.npv, -financial.capex);
}

#[test]
fn zero_capacity_imports_everything() {
    let mut request = sweep_request(flat_consumption(1_000.0), 0.0, 0.0, 10.0);
    request.finance = Some(FinancialParameters::default());
    let response = analyze(&request, &CancelToken::new()).expect("sweep");

    assert_eq!(response.scenarios.len(), 1);
    let scenario = &response.scenarios[0];
    assert_eq!(scenario.result.production_kwh, 0.0);
    assert_eq!(scenario.result.self_consumed_kwh, 0.0);
    assert!((scenario.result.imported_kwh - 8_760_000.0).abs() < EPS);
    let economics = scenario.economics.as_ref().expect("economics");
    assert_eq!(economics.capex, 0.0);
    assert_eq!(economics.npv, 0.0);
    assert_eq!(economics.payback_years, None);
}

#[test]
fn matching_tracks_need_no_grid() {
    let cons = office_consumption(70.0, 5.0);
    let prod = TimeSeries::new(cons.timestamps().to_vec(), cons.values().to_vec()).expect("copy");
    let result = simulate(&prod, &cons, None, ExportMode::Allowed).expect("run");

    assert!((result.self_consumed_kwh - prod.total()).abs() < EPS);
    assert!((result.self_consumed_kwh - cons.total()).abs() < EPS);
    assert_eq!(result.exported_kwh, 0.0);
    assert_eq!(result.imported_kwh, 0.0);
}

#[test]
fn always_negative_flows_have_no_irr() {
    assert!(!irr(&[-1_000.0, -50.0, -50.0, -50.0]).is_defined());

    let prod = production(100.0);
    let cons = flat_consumption(30.0);
    let result = simulate(&prod, &cons, None, ExportMode::Allowed).expect("run");
    let params = FinancialParameters {
        energy_price_per_mwh: 0.0,
        ..FinancialParameters::default()
    };
    let financial = evaluate(&CapacityScenario::pv_only(100.0, 1.2), &result, None, &params)
        .expect("evaluate");
    assert!(financial.irr.rate().is_none());
    assert!(financial.payback_years.is_none());
}
