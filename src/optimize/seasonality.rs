//! Seasonal sizing: demand bands from typical days and a search over
//! capacity, DC/AC ratio and per-band power limits.

use chrono::{Datelike, Timelike};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::grid::{CancelToken, CapacityRange, MAX_GRID_POINTS};
use super::sweep::ScenarioResult;
use super::variants::{Variant, VariantKind};
use crate::error::{EngineError, Result, ensure_positive};
use crate::finance::{FinancialParameters, Irr, evaluate};
use crate::series::TimeSeries;
use crate::sim::dispatch::simulate_hourly;
use crate::sim::types::{BessConfig, CapacityScenario, ExportMode, HourRecord, SimulationResult};
use crate::solar::production::{ProductionProfileGenerator, UnitProfile};
use crate::solar::site::{LossFactors, SiteConfig};

/// Months per band when bands are derived from consumption.
const MONTHS_PER_OUTER_BAND: usize = 4;

/// Average day of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypicalDay {
    /// 1 = January.
    pub month: u32,
    pub days: usize,
    pub mean_daily_kwh: f64,
    /// Mean consumption per hour of day, kWh.
    pub hourly_kwh: [f64; 24],
}

/// Builds one typical day per month from an hourly consumption series.
///
/// Months absent from the series report zero days and zero energy.
pub fn typical_days(consumption: &TimeSeries) -> Vec<TypicalDay> {
    let mut sums = [[0.0_f64; 24]; 12];
    let mut counts = [[0_usize; 24]; 12];
    for (ts, v) in consumption.timestamps().iter().zip(consumption.values()) {
        let m = ts.month0() as usize;
        let h = ts.hour() as usize;
        sums[m][h] += v;
        counts[m][h] += 1;
    }

    (0..12)
        .map(|m| {
            let mut hourly_kwh = [0.0; 24];
            for h in 0..24 {
                if counts[m][h] > 0 {
                    hourly_kwh[h] = sums[m][h] / counts[m][h] as f64;
                }
            }
            TypicalDay {
                month: m as u32 + 1,
                days: counts[m].iter().copied().max().unwrap_or(0),
                mean_daily_kwh: hourly_kwh.iter().sum(),
                hourly_kwh,
            }
        })
        .collect()
}

/// Demand band of a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonBand {
    High,
    Mid,
    Low,
}

impl SeasonBand {
    pub const ALL: [SeasonBand; 3] = [SeasonBand::High, SeasonBand::Mid, SeasonBand::Low];
}

/// Assigns the four highest-demand months to `High`, the four lowest to
/// `Low` and the rest to `Mid`. Equal demand keeps calendar order.
pub fn derive_bands(days: &[TypicalDay]) -> [SeasonBand; 12] {
    let mut order: Vec<usize> = (0..12).collect();
    let demand = |m: usize| days.get(m).map_or(0.0, |d| d.mean_daily_kwh);
    order.sort_by(|a, b| demand(*b).total_cmp(&demand(*a)));

    let mut bands = [SeasonBand::Mid; 12];
    for (rank, m) in order.into_iter().enumerate() {
        if rank < MONTHS_PER_OUTER_BAND {
            bands[m] = SeasonBand::High;
        } else if rank >= 12 - MONTHS_PER_OUTER_BAND {
            bands[m] = SeasonBand::Low;
        }
    }
    bands
}

/// One value per band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandValues {
    pub high: f64,
    pub mid: f64,
    pub low: f64,
}

impl BandValues {
    pub fn get(&self, band: SeasonBand) -> f64 {
        match band {
            SeasonBand::High => self.high,
            SeasonBand::Mid => self.mid,
            SeasonBand::Low => self.low,
        }
    }
}

/// What the seasonal search maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityObjective {
    /// Self-consumed energy in the target bands.
    #[default]
    SelfConsumption,
    /// Project NPV with savings and export revenue counted only in the
    /// target bands; requires financial parameters.
    Npv,
}

fn default_scalers() -> Vec<f64> {
    vec![0.5, 0.75, 1.0]
}

fn default_targets() -> Vec<SeasonBand> {
    SeasonBand::ALL.to_vec()
}

/// Inputs of [`optimize_seasonality`].
///
/// AC output in each hour is limited to
/// `band_powers_kw[band] × scaler[band]`, where one scaler per band is
/// drawn from `scalers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeasonalityRequest {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub losses: LossFactors,
    pub consumption: TimeSeries,
    pub capacity: CapacityRange,
    /// Empty means the archetype default.
    #[serde(default)]
    pub dcac_ratios: Vec<f64>,
    pub band_powers_kw: BandValues,
    /// Derived from `consumption` when absent.
    #[serde(default)]
    pub monthly_bands: Option<[SeasonBand; 12]>,
    #[serde(default = "default_scalers")]
    pub scalers: Vec<f64>,
    #[serde(default)]
    pub objective: SeasonalityObjective,
    #[serde(default = "default_targets")]
    pub target_seasons: Vec<SeasonBand>,
    #[serde(default)]
    pub export_mode: ExportMode,
    #[serde(default)]
    pub bess: Option<BessConfig>,
    #[serde(default)]
    pub finance: Option<FinancialParameters>,
}

impl SeasonalityRequest {
    fn dcac_ratios(&self) -> Vec<f64> {
        if self.dcac_ratios.is_empty() {
            vec![self.site.archetype.default_dcac_ratio()]
        } else {
            self.dcac_ratios.clone()
        }
    }

    fn grid_len(&self) -> usize {
        self.capacity.len() * self.dcac_ratios().len() * self.scalers.len().pow(3)
    }

    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first malformed field.
    pub fn validate(&self) -> Result<()> {
        self.consumption.ensure_one_year("consumption")?;
        self.site.validate()?;
        self.losses.validate()?;
        self.capacity.validate()?;
        for (i, r) in self.dcac_ratios.iter().enumerate() {
            ensure_positive(&format!("dcac_ratios[{i}]"), *r)?;
        }
        for band in SeasonBand::ALL {
            let field = format!("band_powers_kw.{}", band_name(band));
            ensure_positive(&field, self.band_powers_kw.get(band))?;
        }
        if self.scalers.is_empty() {
            return Err(EngineError::input("scalers", "at least one value required"));
        }
        for (i, s) in self.scalers.iter().enumerate() {
            ensure_positive(&format!("scalers[{i}]"), *s)?;
        }
        if self.target_seasons.is_empty() {
            return Err(EngineError::input("target_seasons", "at least one band required"));
        }
        if let Some(bess) = &self.bess {
            bess.validate()?;
        }
        match (&self.finance, self.objective) {
            (Some(params), _) => params.validate()?,
            (None, SeasonalityObjective::Npv) => {
                return Err(EngineError::input("finance", "required for the npv objective"));
            }
            (None, SeasonalityObjective::SelfConsumption) => {}
        }
        if self.grid_len() > MAX_GRID_POINTS {
            return Err(EngineError::input(
                "scalers",
                format!("grid of {} points exceeds {MAX_GRID_POINTS}", self.grid_len()),
            ));
        }
        Ok(())
    }
}

fn band_name(band: SeasonBand) -> &'static str {
    match band {
        SeasonBand::High => "high",
        SeasonBand::Mid => "mid",
        SeasonBand::Low => "low",
    }
}

/// One evaluated point of the seasonal grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalConfiguration {
    pub capacity_kwp: f64,
    pub dcac_ratio: f64,
    pub scalers: BandValues,
    pub annual_production_mwh: f64,
    pub annual_self_consumed_mwh: f64,
    pub annual_exported_mwh: f64,
    pub annual_imported_mwh: f64,
    /// Self-consumed energy in the target bands.
    pub target_self_consumed_mwh: f64,
    pub autoconsumption_pct: Option<f64>,
    pub coverage_pct: Option<f64>,
    /// Whole-year NPV.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npv: Option<f64>,
    /// NPV of the target bands alone, full CAPEX included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_npv: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irr: Option<Irr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payback_years: Option<f64>,
    /// Value of the objective; higher is better.
    pub objective: f64,
}

/// Outcome of the seasonal search.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalityResponse {
    pub bands: [SeasonBand; 12],
    pub typical_days: Vec<TypicalDay>,
    pub best_capacity_kwp: f64,
    pub best_dcac_ratio: f64,
    pub best_scalers: BandValues,
    pub annual_production_mwh: f64,
    pub annual_self_consumed_mwh: f64,
    pub annual_exported_mwh: f64,
    pub annual_imported_mwh: f64,
    pub npv: Option<f64>,
    pub irr: Option<Irr>,
    pub payback_years: Option<f64>,
    pub variant: Variant,
    /// Every grid point in enumeration order.
    pub all_configurations: Vec<SeasonalConfiguration>,
}

#[derive(Debug, Clone, Copy)]
struct GridPoint {
    capacity_kwp: f64,
    dcac_ratio: f64,
    scalers: BandValues,
}

fn grid(request: &SeasonalityRequest) -> Vec<GridPoint> {
    let ratios = request.dcac_ratios();
    let mut points = Vec::with_capacity(request.grid_len());
    for capacity_kwp in request.capacity.capacities() {
        for &dcac_ratio in &ratios {
            for &high in &request.scalers {
                for &mid in &request.scalers {
                    for &low in &request.scalers {
                        points.push(GridPoint {
                            capacity_kwp,
                            dcac_ratio,
                            scalers: BandValues { high, mid, low },
                        });
                    }
                }
            }
        }
    }
    points
}

/// Searches capacity × DC/AC ratio × per-band scalers for the best objective.
///
/// Grid points are evaluated in parallel and reported in enumeration order
/// (capacity, ratio, then high/mid/low scalers ascending through
/// `scalers`). Among equal objectives the earliest point wins, so the
/// smallest system with the tightest limits is preferred.
///
/// # Errors
///
/// Returns `EngineError::Input` for malformed requests and
/// `EngineError::Cancelled` when `cancel` fires.
pub fn optimize_seasonality(
    request: &SeasonalityRequest,
    cancel: &CancelToken,
) -> Result<SeasonalityResponse> {
    request.validate()?;

    let typical = typical_days(&request.consumption);
    let bands = request.monthly_bands.unwrap_or_else(|| derive_bands(&typical));
    let generator = ProductionProfileGenerator::new(request.site.clone(), request.losses.clone())?;
    let unit = generator.unit_profile(request.consumption.timestamps());
    let points = grid(request);

    info!(
        candidates = points.len(),
        objective = ?request.objective,
        targets = ?request.target_seasons,
        "starting seasonality search"
    );

    let evaluated = points
        .par_iter()
        .map(|point| {
            cancel.check()?;
            evaluate_point(request, &unit, &bands, point)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut best: Option<usize> = None;
    for (i, (config, _)) in evaluated.iter().enumerate() {
        if best.is_none_or(|b| config.objective > evaluated[b].0.objective) {
            best = Some(i);
        }
    }
    let Some(best) = best else {
        return Err(EngineError::input("capacity", "search grid is empty"));
    };

    let (all_configurations, mut scenarios): (Vec<_>, Vec<_>) = evaluated.into_iter().unzip();
    let chosen = all_configurations[best].clone();
    let variant = Variant::from_scenario(
        VariantKind::SeasonalityOptimal,
        &scenarios.swap_remove(best),
        None,
        true,
        Vec::new(),
    );

    info!(
        capacity_kwp = chosen.capacity_kwp,
        dcac_ratio = chosen.dcac_ratio,
        objective = chosen.objective,
        "seasonality optimum selected"
    );

    Ok(SeasonalityResponse {
        bands,
        typical_days: typical,
        best_capacity_kwp: chosen.capacity_kwp,
        best_dcac_ratio: chosen.dcac_ratio,
        best_scalers: chosen.scalers,
        annual_production_mwh: chosen.annual_production_mwh,
        annual_self_consumed_mwh: chosen.annual_self_consumed_mwh,
        annual_exported_mwh: chosen.annual_exported_mwh,
        annual_imported_mwh: chosen.annual_imported_mwh,
        npv: chosen.npv,
        irr: chosen.irr.clone(),
        payback_years: chosen.payback_years,
        variant,
        all_configurations,
    })
}

fn evaluate_point(
    request: &SeasonalityRequest,
    unit: &UnitProfile,
    bands: &[SeasonBand; 12],
    point: &GridPoint,
) -> Result<(SeasonalConfiguration, ScenarioResult)> {
    let consumption = &request.consumption;
    let limit_for_hour = |i: usize| {
        let band = bands[consumption.month_index(i)];
        request.band_powers_kw.get(band) * point.scalers.get(band)
    };
    let production = unit.production_capped(point.capacity_kwp, point.dcac_ratio, limit_for_hour)?;

    let baseline = match &request.bess {
        Some(_) => Some(simulate_hourly(&production, consumption, None, request.export_mode)?),
        None => None,
    };
    let (result, hours) = simulate_hourly(
        &production,
        consumption,
        request.bess.as_ref(),
        request.export_mode,
    )?;

    let scenario = CapacityScenario {
        capacity_kwp: point.capacity_kwp,
        dcac_ratio: point.dcac_ratio,
        bess: request.bess.clone(),
    };
    let in_target = |h: &HourRecord| request.target_seasons.contains(&bands[h.month0.min(11)]);
    let nameplate = request.bess.as_ref().map_or(0.0, |b| b.energy_kwh);

    let target_npv = match &request.finance {
        Some(params) if request.objective == SeasonalityObjective::Npv => {
            let target = restrict(&result, &hours, nameplate, in_target);
            let target_baseline = baseline
                .as_ref()
                .map(|(b, b_hours)| restrict(b, b_hours, 0.0, in_target));
            Some(evaluate(&scenario, &target, target_baseline.as_ref(), params)?.npv)
        }
        _ => None,
    };

    let scored = ScenarioResult::new(
        scenario,
        result,
        baseline.map(|(b, _)| b),
        request.finance.as_ref(),
    )?;

    let target_self_kwh: f64 = (0..12)
        .filter(|m| request.target_seasons.contains(&bands[*m]))
        .map(|m| scored.result.monthly_self_consumed_kwh[m])
        .sum();
    let npv = scored.npv();
    let objective = match request.objective {
        SeasonalityObjective::SelfConsumption => target_self_kwh,
        SeasonalityObjective::Npv => target_npv.unwrap_or(f64::NEG_INFINITY),
    };
    debug!(
        capacity_kwp = point.capacity_kwp,
        dcac_ratio = point.dcac_ratio,
        objective,
        "evaluated seasonal candidate"
    );

    let r = &scored.result;
    let config = SeasonalConfiguration {
        capacity_kwp: point.capacity_kwp,
        dcac_ratio: point.dcac_ratio,
        scalers: point.scalers,
        annual_production_mwh: r.production_kwh / 1000.0,
        annual_self_consumed_mwh: r.self_consumed_kwh / 1000.0,
        annual_exported_mwh: r.exported_kwh / 1000.0,
        annual_imported_mwh: r.imported_kwh / 1000.0,
        target_self_consumed_mwh: target_self_kwh / 1000.0,
        autoconsumption_pct: scored.autoconsumption_pct,
        coverage_pct: scored.coverage_pct,
        npv,
        target_npv,
        irr: scored.economics.as_ref().map(|e| e.irr.clone()),
        payback_years: scored.economics.as_ref().and_then(|e| e.payback_years),
        objective,
    };
    Ok((config, scored))
}

/// Totals of the hours accepted by `keep`, as if the rest never happened.
fn restrict(
    result: &SimulationResult,
    hours: &[HourRecord],
    nameplate_energy_kwh: f64,
    keep: impl Fn(&HourRecord) -> bool,
) -> SimulationResult {
    let kept: Vec<HourRecord> = hours.iter().copied().filter(|h| keep(h)).collect();
    SimulationResult::from_hours(
        &kept,
        result.export_mode,
        result.bess.clone(),
        nameplate_energy_kwh,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::HOURS_PER_YEAR;

    /// Flat load with a winter bump in Nov-Feb.
    fn consumption() -> TimeSeries {
        let timestamps = crate::series::hourly_year(2023).expect("valid year");
        let values = timestamps
            .iter()
            .map(|ts| match ts.month() {
                11 | 12 | 1 | 2 => 30.0,
                5..=8 => 10.0,
                _ => 20.0,
            })
            .collect();
        TimeSeries::new(timestamps, values).expect("valid")
    }

    fn request() -> SeasonalityRequest {
        SeasonalityRequest {
            site: SiteConfig::default(),
            losses: LossFactors::default(),
            consumption: consumption(),
            capacity: CapacityRange {
                min_kwp: 0.0,
                max_kwp: 100.0,
                step_kwp: 50.0,
            },
            dcac_ratios: vec![1.2],
            band_powers_kw: BandValues {
                high: 40.0,
                mid: 40.0,
                low: 40.0,
            },
            monthly_bands: None,
            scalers: vec![0.5, 1.0],
            objective: SeasonalityObjective::SelfConsumption,
            target_seasons: default_targets(),
            export_mode: ExportMode::Allowed,
            bess: None,
            finance: None,
        }
    }

    #[test]
    fn typical_days_average_each_month() {
        let days = typical_days(&consumption());
        assert_eq!(days.len(), 12);
        assert_eq!(days[0].days, 31);
        assert_eq!(days[1].days, 28);
        assert!((days[0].mean_daily_kwh - 720.0).abs() < 1e-9);
        assert!((days[6].hourly_kwh[12] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn bands_follow_demand() {
        let bands = derive_bands(&typical_days(&consumption()));
        for m in [0, 1, 10, 11] {
            assert_eq!(bands[m], SeasonBand::High);
        }
        for m in 4..8 {
            assert_eq!(bands[m], SeasonBand::Low);
        }
        assert_eq!(bands[2], SeasonBand::Mid);
    }

    #[test]
    fn grid_covers_every_combination() {
        let req = request();
        let out = optimize_seasonality(&req, &CancelToken::new()).expect("valid");
        assert_eq!(out.all_configurations.len(), 3 * 8);
        assert_eq!(out.variant.kind, VariantKind::SeasonalityOptimal);
        assert!(out.best_capacity_kwp > 0.0);
        let best = out
            .all_configurations
            .iter()
            .map(|c| c.objective)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(out.all_configurations.iter().all(|c| c.objective <= best));
    }

    #[test]
    fn band_limit_caps_hourly_feed_in() {
        let mut req = request();
        req.capacity = CapacityRange {
            min_kwp: 200.0,
            max_kwp: 200.0,
            step_kwp: 1.0,
        };
        req.scalers = vec![0.25];
        let out = optimize_seasonality(&req, &CancelToken::new()).expect("valid");
        let cfg = &out.all_configurations[0];
        assert!(cfg.annual_production_mwh * 1000.0 <= 10.0 * HOURS_PER_YEAR as f64 + 1e-6);
    }

    #[test]
    fn npv_objective_requires_finance() {
        let mut req = request();
        req.objective = SeasonalityObjective::Npv;
        let err = optimize_seasonality(&req, &CancelToken::new()).expect_err("must fail");
        assert_eq!(err.field(), Some("finance"));

        req.finance = Some(FinancialParameters::default());
        let out = optimize_seasonality(&req, &CancelToken::new()).expect("valid");
        assert!(out.npv.is_some());
        assert!(out.irr.is_some());
    }

    #[test]
    fn npv_objective_counts_only_target_bands() {
        let mut req = request();
        req.objective = SeasonalityObjective::Npv;
        req.finance = Some(FinancialParameters::default());
        req.scalers = vec![1.0];

        req.target_seasons = vec![SeasonBand::High];
        let winter = optimize_seasonality(&req, &CancelToken::new()).expect("valid");
        req.target_seasons = vec![SeasonBand::Low];
        let summer = optimize_seasonality(&req, &CancelToken::new()).expect("valid");

        let objectives = |out: &SeasonalityResponse| {
            out.all_configurations.iter().map(|c| c.objective).collect::<Vec<_>>()
        };
        assert_ne!(objectives(&winter), objectives(&summer));

        // same system, different bands: whole-year NPV is unchanged
        let last = winter.all_configurations.len() - 1;
        assert_eq!(
            winter.all_configurations[last].npv,
            summer.all_configurations[last].npv
        );
        for cfg in winter.all_configurations.iter().chain(&summer.all_configurations) {
            assert_eq!(cfg.target_npv, Some(cfg.objective));
            let whole = cfg.npv.expect("finance given");
            assert!(cfg.objective <= whole + 1e-6);
        }

        req.target_seasons = default_targets();
        let all = optimize_seasonality(&req, &CancelToken::new()).expect("valid");
        for cfg in &all.all_configurations {
            let whole = cfg.npv.expect("finance given");
            assert!((cfg.objective - whole).abs() < 1e-6);
        }
    }

    #[test]
    fn explicit_bands_override_derived() {
        let mut req = request();
        req.monthly_bands = Some([SeasonBand::Low; 12]);
        req.target_seasons = vec![SeasonBand::High];
        let out = optimize_seasonality(&req, &CancelToken::new()).expect("valid");
        assert_eq!(out.bands, [SeasonBand::Low; 12]);
        // no month in a target band: every point ties at zero, earliest wins
        assert_eq!(out.best_capacity_kwp, 0.0);
    }

    #[test]
    fn cancelled_search_stops() {
        let token = CancelToken::new();
        token.cancel();
        let err = optimize_seasonality(&request(), &token).expect_err("must cancel");
        assert!(matches!(err, EngineError::Cancelled));
    }
}
