//! Hourly reconciliation of PV production against site consumption.

use tracing::warn;

use crate::devices::{Battery, Device, DeviceContext};
use crate::error::Result;
use crate::series::TimeSeries;

use super::types::{BessConfig, BessStatus, ExportMode, HourRecord, SimulationResult};

/// Runs the dispatch and keeps every hourly record.
///
/// Per hour, PV first serves consumption directly. Any surplus charges the
/// battery (up to its power limit and SoC headroom) and the rest is exported
/// or curtailed according to `export_mode`. Any deficit is served by the
/// battery (up to its power limit and available energy after losses) and
/// the rest is imported.
///
/// A battery with zero power or zero energy is ignored: the run is PV-only
/// and the result carries [`BessStatus::Disabled`].
///
/// # Errors
///
/// Returns `EngineError::Input` if the series are not aligned or the battery
/// configuration is malformed.
pub fn simulate_hourly(
    production: &TimeSeries,
    consumption: &TimeSeries,
    bess: Option<&BessConfig>,
    export_mode: ExportMode,
) -> Result<(SimulationResult, Vec<HourRecord>)> {
    production.ensure_aligned(consumption, "consumption")?;

    let (mut battery, status) = match bess {
        None => (None, BessStatus::NotConfigured),
        Some(cfg) => {
            cfg.validate()?;
            if cfg.is_operational() {
                (Some(Battery::new(cfg)), BessStatus::Active)
            } else {
                let reason = format!(
                    "power {} kW / energy {} kWh leaves nothing to dispatch",
                    cfg.power_kw, cfg.energy_kwh
                );
                warn!(%reason, "battery disabled, simulating PV only");
                (None, BessStatus::Disabled { reason })
            }
        }
    };
    let nameplate = battery.as_ref().map_or(0.0, |b| b.energy_kwh);

    let mut hours = Vec::with_capacity(production.len());
    for (t, ((p, c), at)) in production
        .values()
        .iter()
        .zip(consumption.values())
        .zip(production.timestamps())
        .enumerate()
    {
        let direct = p.min(*c);
        let mut surplus = p - direct;
        let mut deficit = c - direct;
        let mut charged = 0.0;
        let mut discharged = 0.0;

        if let Some(b) = battery.as_mut() {
            if surplus > 0.0 {
                charged = b.energy_kwh(&DeviceContext::with_setpoint(*at, surplus));
                surplus -= charged;
            } else if deficit > 0.0 {
                discharged = -b.energy_kwh(&DeviceContext::with_setpoint(*at, -deficit));
                deficit -= discharged;
            }
        }

        let (exported, curtailed) = match export_mode {
            ExportMode::Allowed => (surplus, 0.0),
            ExportMode::Zero => (0.0, surplus),
        };

        hours.push(HourRecord {
            timestep: t,
            month0: production.month_index(t),
            production: *p,
            consumption: *c,
            direct,
            charged,
            discharged,
            exported,
            curtailed,
            imported: deficit,
            soc_kwh: battery.as_ref().map_or(0.0, |b| b.soc_kwh),
        });
    }

    let result = SimulationResult::from_hours(&hours, export_mode, status, nameplate);
    Ok((result, hours))
}

/// Runs the dispatch and returns annual totals only.
///
/// # Errors
///
/// Same as [`simulate_hourly`].
pub fn simulate(
    production: &TimeSeries,
    consumption: &TimeSeries,
    bess: Option<&BessConfig>,
    export_mode: ExportMode,
) -> Result<SimulationResult> {
    simulate_hourly(production, consumption, bess, export_mode).map(|(result, _)| result)
}

/// Reconstructs the PV-only result from a battery run.
///
/// Exact for this dispatch: the battery only ever absorbs surplus and only
/// ever serves deficit, so without it charged energy would have left the
/// site (exported or curtailed) and discharged energy would have been
/// imported.
pub fn estimate_baseline_without_bess(result: &SimulationResult) -> SimulationResult {
    let (exported_kwh, curtailed_kwh) = match result.export_mode {
        ExportMode::Allowed => (
            result.exported_kwh + result.charged_kwh + result.curtailed_kwh,
            0.0,
        ),
        ExportMode::Zero => (
            result.exported_kwh,
            result.curtailed_kwh + result.charged_kwh,
        ),
    };
    let mut monthly_self_consumed_kwh = result.monthly_self_consumed_kwh;
    for (s, d) in monthly_self_consumed_kwh
        .iter_mut()
        .zip(result.monthly_discharged_kwh)
    {
        *s -= d;
    }

    SimulationResult {
        production_kwh: result.production_kwh,
        consumption_kwh: result.consumption_kwh,
        self_consumed_kwh: result.direct_kwh,
        direct_kwh: result.direct_kwh,
        exported_kwh,
        imported_kwh: result.imported_kwh + result.discharged_kwh,
        charged_kwh: 0.0,
        discharged_kwh: 0.0,
        curtailed_kwh,
        equivalent_full_cycles: 0.0,
        export_mode: result.export_mode,
        bess: BessStatus::NotConfigured,
        monthly_production_kwh: result.monthly_production_kwh,
        monthly_self_consumed_kwh,
        monthly_discharged_kwh: [0.0; 12],
    }
}
