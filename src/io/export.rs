//! CSV export of sweep scenarios.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::optimize::sweep::ScenarioResult;

/// Column header for scenario export.
const HEADER: &str = "capacity_kwp,dcac_ratio,bess_power_kw,bess_energy_kwh,\
                       production_kwh,self_consumed_kwh,exported_kwh,imported_kwh,\
                       charged_kwh,discharged_kwh,curtailed_kwh,\
                       autoconsumption_pct,coverage_pct,capex,npv,irr,payback_years";

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(String::new, |v| format!("{v:.precision$}"))
}

/// Exports sweep scenarios to a CSV file at the given path.
///
/// # Arguments
///
/// * `scenarios` - Sweep output, one row each
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_scenarios_csv(scenarios: &[ScenarioResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_scenarios_csv(scenarios, io::BufWriter::new(file))
}

/// Writes sweep scenarios as CSV to any writer.
///
/// Missing values (no battery, undefined IRR, no economics) are written as
/// empty cells. Output is deterministic for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_scenarios_csv(scenarios: &[ScenarioResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for s in scenarios {
        let r = &s.result;
        let bess = s.scenario.bess.as_ref();
        let econ = s.economics.as_ref();
        wtr.write_record(&[
            format!("{:.3}", s.scenario.capacity_kwp),
            format!("{:.3}", s.scenario.dcac_ratio),
            opt(bess.map(|b| b.power_kw), 3),
            opt(bess.map(|b| b.energy_kwh), 3),
            format!("{:.3}", r.production_kwh),
            format!("{:.3}", r.self_consumed_kwh),
            format!("{:.3}", r.exported_kwh),
            format!("{:.3}", r.imported_kwh),
            format!("{:.3}", r.charged_kwh),
            format!("{:.3}", r.discharged_kwh),
            format!("{:.3}", r.curtailed_kwh),
            opt(s.autoconsumption_pct, 4),
            opt(s.coverage_pct, 4),
            opt(econ.map(|e| e.capex), 2),
            opt(econ.map(|e| e.npv), 2),
            opt(econ.and_then(|e| e.irr.rate()), 6),
            opt(econ.and_then(|e| e.payback_years), 3),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::{BessConfig, BessStatus, CapacityScenario, ExportMode, SimulationResult};

    fn scenario(capacity_kwp: f64, bess: Option<BessConfig>) -> ScenarioResult {
        let result = SimulationResult {
            production_kwh: capacity_kwp * 1000.0,
            consumption_kwh: 100_000.0,
            self_consumed_kwh: capacity_kwp * 800.0,
            direct_kwh: capacity_kwp * 800.0,
            exported_kwh: capacity_kwp * 200.0,
            imported_kwh: 100_000.0 - capacity_kwp * 800.0,
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
        let scenario = CapacityScenario {
            capacity_kwp,
            dcac_ratio: 1.2,
            bess,
        };
        ScenarioResult::new(scenario, result, None, None).expect("valid")
    }

    fn write(scenarios: &[ScenarioResult]) -> String {
        let mut buf = Vec::new();
        write_scenarios_csv(scenarios, &mut buf).expect("in-memory write");
        String::from_utf8(buf).expect("utf-8")
    }

    #[test]
    fn one_row_per_scenario() {
        let scenarios: Vec<_> = (1..=4).map(|i| scenario(f64::from(i) * 10.0, None)).collect();
        let out = write(&scenarios);
        assert_eq!(out.lines().count(), 5);
        assert!(out.lines().next().is_some_and(|h| h.starts_with("capacity_kwp,dcac_ratio")));
    }

    #[test]
    fn missing_values_are_empty_cells() {
        let out = write(&[scenario(10.0, None)]);
        let mut rdr = csv::Reader::from_reader(out.as_bytes());
        let headers = rdr.headers().expect("header").clone();
        let row = rdr.records().next().expect("row").expect("parse");
        assert_eq!(row.len(), headers.len());
        assert_eq!(&row[2], "");
        assert_eq!(&row[14], "");
        assert_eq!(&row[11], "80.0000");
    }

    #[test]
    fn battery_columns_are_filled() {
        let out = write(&[scenario(10.0, Some(BessConfig::new(50.0, 100.0)))]);
        let mut rdr = csv::Reader::from_reader(out.as_bytes());
        let row = rdr.records().next().expect("row").expect("parse");
        assert_eq!(&row[2], "50.000");
        assert_eq!(&row[3], "100.000");
    }

    #[test]
    fn deterministic_output() {
        let scenarios = vec![scenario(10.0, None), scenario(20.0, None)];
        assert_eq!(write(&scenarios), write(&scenarios));
    }
}
