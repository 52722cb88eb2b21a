//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use pv_sizer::optimize::{AnalyzeRequest, CapacityRange, Thresholds};
use pv_sizer::series::{HOURS_PER_YEAR, TimeSeries};
use pv_sizer::sim::types::ExportMode;
use pv_sizer::solar::{Archetype, LossFactors, ProductionProfileGenerator, SiteConfig};

/// Non-leap year used by every fixture.
pub const YEAR: i32 = 2023;

/// Constant consumption of `kwh` every hour of [`YEAR`].
pub fn flat_consumption(kwh: f64) -> TimeSeries {
    TimeSeries::for_year(YEAR, vec![kwh; HOURS_PER_YEAR]).expect("flat year is valid")
}

/// Daytime-heavy consumption: `day_kwh` from 07:00 to 18:59, `night_kwh` otherwise.
pub fn office_consumption(day_kwh: f64, night_kwh: f64) -> TimeSeries {
    let values = (0..HOURS_PER_YEAR)
        .map(|h| if (7..19).contains(&(h % 24)) { day_kwh } else { night_kwh })
        .collect();
    TimeSeries::for_year(YEAR, values).expect("office year is valid")
}

/// South-facing ground mount near Warsaw.
pub fn default_site() -> SiteConfig {
    SiteConfig::for_archetype(Archetype::GroundSouth, 52.23, 21.01)
}

/// Hourly production of `capacity_kwp` at [`default_site`] over [`YEAR`].
pub fn production(capacity_kwp: f64) -> TimeSeries {
    let generator = ProductionProfileGenerator::new(default_site(), LossFactors::default())
        .expect("default site is valid");
    let timestamps = pv_sizer::series::hourly_year(YEAR).expect("valid year");
    generator
        .generate(capacity_kwp, 1.2, &timestamps)
        .expect("production profile")
}

/// PV-only sweep request over `min..=max` kWp in `step` increments.
pub fn sweep_request(consumption: TimeSeries, min: f64, max: f64, step: f64) -> AnalyzeRequest {
    AnalyzeRequest {
        site: default_site(),
        losses: LossFactors::default(),
        dcac_ratio: Some(1.2),
        consumption,
        capacity: CapacityRange {
            min_kwp: min,
            max_kwp: max,
            step_kwp: step,
        },
        thresholds: Thresholds::default(),
        bess: None,
        export_mode: ExportMode::Allowed,
        finance: None,
        npv_mode: None,
    }
}
