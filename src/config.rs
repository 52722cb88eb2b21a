//! TOML-based run configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::devices::DemandProfile;
use crate::error::EngineError;
use crate::finance::FinancialParameters;
use crate::optimize::{AnalyzeRequest, BessSweep, CapacityRange, NpvMode, Thresholds};
use crate::scoring::{DEFAULT_EMISSION_FACTOR_KG_PER_KWH, ScoringParameters};
use crate::series::TimeSeries;
use crate::sim::types::{BessConfig, ExportMode};
use crate::solar::site::{Archetype, LossFactors, SiteConfig};

/// Top-level run configuration parsed from TOML.
///
/// Every section has defaults; `[bess]` and `[finance]` switch the battery
/// sweep and the economics on when present. Load from TOML with
/// [`RunConfig::from_toml_file`] or start from [`RunConfig::ground_south`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub losses: LossFactors,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub bess: Option<BessSweep>,
    #[serde(default)]
    pub finance: Option<FinancialParameters>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Synthetic demand used when no consumption file is given.
    #[serde(default)]
    pub demand: DemandProfile,
}

/// Capacity grid and variant selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub capacity_min_kwp: f64,
    pub capacity_max_kwp: f64,
    pub capacity_step_kwp: f64,
    /// Archetype default when absent.
    pub dcac_ratio: Option<f64>,
    pub thresholds: Thresholds,
    pub export_mode: ExportMode,
    pub npv_mode: Option<NpvMode>,
    /// Calendar year of the synthetic demand series.
    pub year: i32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            capacity_min_kwp: 0.0,
            capacity_max_kwp: 1_000.0,
            capacity_step_kwp: 50.0,
            dcac_ratio: None,
            thresholds: Thresholds::default(),
            export_mode: ExportMode::Allowed,
            npv_mode: None,
            year: 2023,
        }
    }
}

impl SweepConfig {
    pub fn capacity_range(&self) -> CapacityRange {
        CapacityRange {
            min_kwp: self.capacity_min_kwp,
            max_kwp: self.capacity_max_kwp,
            step_kwp: self.capacity_step_kwp,
        }
    }
}

/// Offer scoring of the selected variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Grid emission factor, kg CO2 per kWh.
    pub emission_factor_kg_per_kwh: f64,
    pub parameters: ScoringParameters,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            emission_factor_kg_per_kwh: DEFAULT_EMISSION_FACTOR_KG_PER_KWH,
            parameters: ScoringParameters::default(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"sweep.capacity_step_kwp"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl From<EngineError> for ConfigError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Input { field, message } => Self { field, message },
            other => Self {
                field: "config".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::input(err.field, err.message)
    }
}

impl RunConfig {
    /// South-facing ground mount, PV only, with economics.
    pub fn ground_south() -> Self {
        Self {
            finance: Some(FinancialParameters::default()),
            ..Self::default()
        }
    }

    /// East-west roof with a battery sweep.
    pub fn roof_east_west_bess() -> Self {
        let site = SiteConfig::for_archetype(Archetype::RoofEastWest, 52.23, 21.01);
        Self {
            site,
            sweep: SweepConfig {
                capacity_max_kwp: 500.0,
                capacity_step_kwp: 25.0,
                ..SweepConfig::default()
            },
            bess: Some(BessSweep {
                power_kw: vec![50.0, 100.0],
                energy_kwh: vec![100.0, 200.0, 400.0],
                parameters: BessConfig::default(),
            }),
            finance: Some(FinancialParameters::default()),
            ..Self::default()
        }
    }

    /// Carport array that may not feed the grid.
    pub fn carport_zero_export() -> Self {
        let site = SiteConfig::for_archetype(Archetype::Carport, 52.23, 21.01);
        Self {
            site,
            sweep: SweepConfig {
                capacity_max_kwp: 300.0,
                capacity_step_kwp: 10.0,
                export_mode: ExportMode::Zero,
                ..SweepConfig::default()
            },
            finance: Some(FinancialParameters {
                feed_in_tariff_per_mwh: 0.0,
                ..FinancialParameters::default()
            }),
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["ground_south", "roof_east_west_bess", "carport_zero_export"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "ground_south" => Ok(Self::ground_south()),
            "roof_east_west_bess" => Ok(Self::roof_east_west_bess()),
            "carport_zero_export" => Ok(Self::carport_zero_export()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates every section and returns one error per failing section.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |result: crate::error::Result<()>| {
            if let Err(e) = result {
                errors.push(ConfigError::from(e));
            }
        };

        check(self.site.validate());
        check(self.losses.validate());
        check(self.sweep.capacity_range().validate());
        check(self.sweep.thresholds.validate());
        if let Some(ratio) = self.sweep.dcac_ratio {
            check(crate::error::ensure_positive("sweep.dcac_ratio", ratio));
        }
        if let Some(mode) = &self.sweep.npv_mode {
            check(mode.validate());
        }
        if let Some(bess) = &self.bess {
            check(bess.validate());
        }
        if let Some(finance) = &self.finance {
            check(finance.validate());
        }
        check(self.scoring.parameters.validate());
        check(crate::error::ensure_non_negative(
            "scoring.emission_factor_kg_per_kwh",
            self.scoring.emission_factor_kg_per_kwh,
        ));
        check(self.demand.validate());

        if self.sweep.npv_mode.is_some() && self.finance.is_none() {
            errors.push(ConfigError {
                field: "sweep.npv_mode".into(),
                message: "requires a [finance] section".into(),
            });
        }
        errors
    }

    /// The analysis request this configuration describes for `consumption`.
    pub fn analyze_request(&self, consumption: TimeSeries) -> AnalyzeRequest {
        AnalyzeRequest {
            site: self.site.clone(),
            losses: self.losses.clone(),
            dcac_ratio: self.sweep.dcac_ratio,
            consumption,
            capacity: self.sweep.capacity_range(),
            thresholds: self.sweep.thresholds,
            bess: self.bess.clone(),
            export_mode: self.sweep.export_mode,
            finance: self.finance.clone(),
            npv_mode: self.sweep.npv_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_are_valid() {
        for name in RunConfig::PRESETS {
            let cfg = RunConfig::from_preset(name).expect("preset should load");
            let errors = cfg.validate();
            assert!(errors.is_empty(), "preset \"{name}\" should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = RunConfig::from_preset("nonexistent").expect_err("must fail");
        assert_eq!(err.field, "preset");
        assert!(err.message.contains("unknown preset"));
    }

    #[test]
    fn presets_differ_where_expected() {
        assert!(RunConfig::ground_south().bess.is_none());
        assert!(RunConfig::roof_east_west_bess().bess.is_some());
        assert!(RunConfig::roof_east_west_bess().site.archetype.is_east_west());
        assert_eq!(
            RunConfig::carport_zero_export().sweep.export_mode,
            ExportMode::Zero
        );
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[site]
latitude = 50.06
longitude = 19.94
archetype = "ground_east_west"

[losses]
soiling_pct = 3.0

[sweep]
capacity_min_kwp = 50.0
capacity_max_kwp = 400.0
capacity_step_kwp = 10.0
export_mode = "zero"

[sweep.thresholds]
A = 97.0

[bess]
power_kw = [50.0]
energy_kwh = [100.0, 200.0]

[finance]
energy_price_per_mwh = 800.0
horizon_years = 20

[scoring.parameters]
profile = "cfo"

[demand]
base_kw = 80.0
"#;
        let cfg = RunConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.site.archetype, Archetype::GroundEastWest);
        assert_eq!(cfg.sweep.capacity_step_kwp, 10.0);
        assert_eq!(cfg.sweep.export_mode, ExportMode::Zero);
        assert_eq!(cfg.sweep.thresholds.a, 97.0);
        assert_eq!(cfg.sweep.thresholds.b, 90.0);
        assert_eq!(cfg.bess.as_ref().map(|b| b.energy_kwh.len()), Some(2));
        assert_eq!(cfg.finance.as_ref().map(|f| f.horizon_years), Some(20));
        assert_eq!(cfg.demand.base_kw, 80.0);
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[sweep]
capacity_step_kwp = 10.0
bogus_field = true
"#;
        assert!(RunConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg = RunConfig::from_toml_str("[sweep]\ncapacity_max_kwp = 200.0\n").expect("valid");
        assert_eq!(cfg.sweep.capacity_max_kwp, 200.0);
        assert_eq!(cfg.sweep.capacity_step_kwp, 50.0);
        assert!(cfg.bess.is_none());
        assert!(cfg.finance.is_none());
    }

    #[test]
    fn validation_reports_every_section() {
        let mut cfg = RunConfig::ground_south();
        cfg.site.latitude = 120.0;
        cfg.sweep.capacity_step_kwp = 0.0;
        cfg.sweep.thresholds.c = 150.0;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"site.latitude".to_string()));
        assert!(fields.contains(&"capacity_step".to_string()));
        assert!(fields.contains(&"thresholds.C".to_string()));
    }

    #[test]
    fn npv_mode_requires_finance() {
        let mut cfg = RunConfig::default();
        cfg.sweep.npv_mode = Some(NpvMode::Unconstrained);
        assert!(cfg.validate().iter().any(|e| e.field == "sweep.npv_mode"));
    }

    #[test]
    fn config_error_converts_to_engine_error() {
        let err: EngineError = ConfigError {
            field: "sweep.year".into(),
            message: "bad".into(),
        }
        .into();
        assert_eq!(err.field(), Some("sweep.year"));
    }
}
