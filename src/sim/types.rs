//! Core dispatch types: battery configuration, scenarios, and results.

use serde::{Deserialize, Serialize};

use super::degradation::BessDegradation;
use crate::error::{EngineError, Result, ensure_in_range, ensure_non_negative, ensure_positive};

/// What happens to surplus PV energy the battery cannot absorb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Surplus is curtailed; nothing is fed into the grid.
    Zero,
    /// Surplus is exported.
    #[default]
    Allowed,
}

/// Battery energy storage parameters.
///
/// # Examples
///
/// ```
/// use pv_sizer::sim::types::BessConfig;
///
/// let bess = BessConfig::new(50.0, 100.0);
/// assert!(bess.validate().is_ok());
/// assert_eq!(bess.usable_energy_kwh(), 80.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BessConfig {
    /// Charge and discharge power limit (kW).
    pub power_kw: f64,
    /// Nameplate energy (kWh).
    pub energy_kwh: f64,
    /// Round-trip efficiency (0..1], applied on discharge.
    pub round_trip_efficiency: f64,
    /// Lower SoC bound as a fraction of nameplate energy.
    pub soc_min: f64,
    /// Upper SoC bound as a fraction of nameplate energy.
    pub soc_max: f64,
    pub degradation: BessDegradation,
}

impl Default for BessConfig {
    fn default() -> Self {
        Self {
            power_kw: 0.0,
            energy_kwh: 0.0,
            round_trip_efficiency: 0.90,
            soc_min: 0.10,
            soc_max: 0.90,
            degradation: BessDegradation::default(),
        }
    }
}

impl BessConfig {
    /// A battery with default efficiency, SoC window and fade.
    pub fn new(power_kw: f64, energy_kwh: f64) -> Self {
        Self {
            power_kw,
            energy_kwh,
            ..Self::default()
        }
    }

    /// Energy between the SoC bounds, kWh.
    pub fn usable_energy_kwh(&self) -> f64 {
        (self.soc_max - self.soc_min) * self.energy_kwh
    }

    /// Whether the battery can move any energy at all.
    ///
    /// Zero power or zero energy disables the battery rather than failing.
    pub fn is_operational(&self) -> bool {
        self.power_kw > 0.0 && self.energy_kwh > 0.0
    }

    /// # Errors
    ///
    /// Returns `EngineError::Input` for negative sizes, an efficiency outside
    /// (0, 1], or an empty/inverted SoC window.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("bess.power_kw", self.power_kw)?;
        ensure_non_negative("bess.energy_kwh", self.energy_kwh)?;
        ensure_positive("bess.round_trip_efficiency", self.round_trip_efficiency)?;
        ensure_in_range(
            "bess.round_trip_efficiency",
            self.round_trip_efficiency,
            0.0,
            1.0,
        )?;
        ensure_in_range("bess.soc_min", self.soc_min, 0.0, 1.0)?;
        ensure_in_range("bess.soc_max", self.soc_max, 0.0, 1.0)?;
        if self.soc_min >= self.soc_max {
            return Err(EngineError::input(
                "bess.soc_max",
                format!("must exceed soc_min ({})", self.soc_min),
            ));
        }
        self.degradation.validate()
    }
}

/// Outcome of the battery for one dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BessStatus {
    /// No battery requested.
    #[default]
    NotConfigured,
    /// Battery took part in the dispatch.
    Active,
    /// Battery requested but ignored; the result is PV-only.
    Disabled { reason: String },
}

/// One candidate system size. Ephemeral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityScenario {
    pub capacity_kwp: f64,
    pub dcac_ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bess: Option<BessConfig>,
}

impl CapacityScenario {
    pub fn pv_only(capacity_kwp: f64, dcac_ratio: f64) -> Self {
        Self {
            capacity_kwp,
            dcac_ratio,
            bess: None,
        }
    }

    /// AC inverter capacity, kW.
    pub fn ac_capacity_kw(&self) -> f64 {
        if self.dcac_ratio > 0.0 {
            self.capacity_kwp / self.dcac_ratio
        } else {
            0.0
        }
    }
}

/// Energy flows for one simulated hour (kWh).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HourRecord {
    pub timestep: usize,
    pub month0: usize,
    pub production: f64,
    pub consumption: f64,
    /// PV energy consumed on site in the same hour.
    pub direct: f64,
    pub charged: f64,
    pub discharged: f64,
    pub exported: f64,
    pub curtailed: f64,
    pub imported: f64,
    /// Stored energy at the end of the hour.
    pub soc_kwh: f64,
}

impl HourRecord {
    /// Consumption met from PV, directly or through the battery.
    pub fn self_consumed(&self) -> f64 {
        self.direct + self.discharged
    }
}

/// Annual totals of one dispatch run (kWh). Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub production_kwh: f64,
    pub consumption_kwh: f64,
    /// Direct use plus battery discharge.
    pub self_consumed_kwh: f64,
    pub direct_kwh: f64,
    pub exported_kwh: f64,
    pub imported_kwh: f64,
    pub charged_kwh: f64,
    pub discharged_kwh: f64,
    pub curtailed_kwh: f64,
    /// Discharged energy over nameplate energy.
    pub equivalent_full_cycles: f64,
    pub export_mode: ExportMode,
    pub bess: BessStatus,
    pub monthly_production_kwh: [f64; 12],
    pub monthly_self_consumed_kwh: [f64; 12],
    pub monthly_discharged_kwh: [f64; 12],
}

impl SimulationResult {
    /// Self-consumed share of production, %; `None` without production.
    pub fn autoconsumption_pct(&self) -> Option<f64> {
        (self.production_kwh > 0.0).then(|| 100.0 * self.self_consumed_kwh / self.production_kwh)
    }

    /// Share of consumption met by PV, %; `None` without consumption.
    pub fn coverage_pct(&self) -> Option<f64> {
        (self.consumption_kwh > 0.0).then(|| 100.0 * self.self_consumed_kwh / self.consumption_kwh)
    }

    pub fn has_active_bess(&self) -> bool {
        self.bess == BessStatus::Active
    }
}
