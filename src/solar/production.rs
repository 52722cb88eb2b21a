//! Hourly AC production from irradiance, losses and array sizing.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::irradiance::{IrradianceSample, irradiance_at};
use super::site::{Archetype, LossFactors, SiteConfig};
use crate::error::{EngineError, Result, ensure_non_negative, ensure_positive};
use crate::series::{TimeSeries, hourly_year};

/// Refractive index of module glass.
const GLASS_REFRACTIVE_INDEX: f64 = 1.526;
/// Glazing extinction coefficient (1/m).
const GLASS_EXTINCTION: f64 = 4.0;
/// Glazing thickness (m).
const GLASS_THICKNESS: f64 = 0.002;
/// Enough halvings to reach adjacent floats.
const MAX_BISECTIONS: usize = 200;

fn glass_transmittance(aoi_rad: f64) -> f64 {
    let refr = (aoi_rad.sin() / GLASS_REFRACTIVE_INDEX).asin();
    let absorption = (-GLASS_EXTINCTION * GLASS_THICKNESS / refr.cos()).exp();
    let s = ((refr - aoi_rad).sin() / (refr + aoi_rad).sin()).powi(2);
    let p = ((refr - aoi_rad).tan() / (refr + aoi_rad).tan()).powi(2);
    absorption * (1.0 - 0.5 * (s + p))
}

/// Fresnel incidence-angle modifier, normalized to 1 at normal incidence.
///
/// Returns 0 for angles of 90° or more.
pub fn fresnel_iam(aoi_deg: f64) -> f64 {
    if aoi_deg >= 90.0 {
        return 0.0;
    }
    if aoi_deg.abs() < 1e-6 {
        return 1.0;
    }
    let normal = (-GLASS_EXTINCTION * GLASS_THICKNESS).exp()
        * (1.0 - ((1.0 - GLASS_REFRACTIVE_INDEX) / (1.0 + GLASS_REFRACTIVE_INDEX)).powi(2));
    (glass_transmittance(aoi_deg.abs().to_radians()) / normal).clamp(0.0, 1.0)
}

/// Effective incidence angle of isotropic sky diffuse on a plane tilted `tilt_deg`.
fn sky_diffuse_angle(tilt_deg: f64) -> f64 {
    59.7 - 0.1388 * tilt_deg + 0.001497 * tilt_deg.powi(2)
}

/// Effective incidence angle of ground-reflected light.
fn ground_reflected_angle(tilt_deg: f64) -> f64 {
    90.0 - 0.5788 * tilt_deg + 0.002693 * tilt_deg.powi(2)
}

/// Cell temperature from the NOCT model.
pub fn cell_temperature(ambient_c: f64, poa_w_m2: f64, noct_c: f64) -> f64 {
    ambient_c + (noct_c - 20.0) / 800.0 * poa_w_m2
}

/// Power derate relative to 25 °C; never negative.
pub fn temperature_derate(cell_c: f64, temp_coeff_pct_per_c: f64) -> f64 {
    (1.0 + temp_coeff_pct_per_c / 100.0 * (cell_c - 25.0)).max(0.0)
}

/// Per-kWp DC energy (after every loss except inverter clipping) for each
/// hour of a series.
///
/// Computing this once and scaling it per capacity keeps the sweep from
/// repeating the irradiance model for every candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitProfile {
    timestamps: Vec<NaiveDateTime>,
    kwh_per_kwp: Vec<f64>,
}

impl UnitProfile {
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.kwh_per_kwp
    }

    /// Unclipped annual yield, kWh/kWp.
    pub fn specific_yield(&self) -> f64 {
        self.kwh_per_kwp.iter().sum()
    }

    /// Hourly AC production for `capacity_kwp` with inverter clipping at
    /// `capacity_kwp / dcac_ratio`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` for a negative capacity or a non-positive
    /// DC/AC ratio.
    pub fn production(&self, capacity_kwp: f64, dcac_ratio: f64) -> Result<TimeSeries> {
        self.production_capped(capacity_kwp, dcac_ratio, |_| f64::INFINITY)
    }

    /// Like [`UnitProfile::production`] with an additional per-hour export
    /// cap (kWh) returned by `cap_for_hour(index)`.
    pub(crate) fn production_capped(
        &self,
        capacity_kwp: f64,
        dcac_ratio: f64,
        cap_for_hour: impl Fn(usize) -> f64,
    ) -> Result<TimeSeries> {
        ensure_non_negative("capacity_kwp", capacity_kwp)?;
        ensure_positive("dcac_ratio", dcac_ratio)?;
        let ac_limit = capacity_kwp / dcac_ratio;
        let values = self
            .kwh_per_kwp
            .iter()
            .enumerate()
            .map(|(i, unit)| (unit * capacity_kwp).min(ac_limit).min(cap_for_hour(i)).max(0.0))
            .collect();
        TimeSeries::new(self.timestamps.clone(), values)
    }

    /// Energy lost to inverter clipping for `capacity_kwp`, kWh.
    pub fn clipped_kwh(&self, capacity_kwp: f64, dcac_ratio: f64) -> f64 {
        if dcac_ratio <= 0.0 {
            return 0.0;
        }
        let ac_limit = capacity_kwp / dcac_ratio;
        self.kwh_per_kwp
            .iter()
            .map(|unit| (unit * capacity_kwp - ac_limit).max(0.0))
            .sum()
    }

    /// Annual AC energy of 1 kWp when the DC profile is scaled by `scale`
    /// and clipped at `ac_limit`.
    fn clipped_total(&self, scale: f64, ac_limit: f64) -> f64 {
        self.kwh_per_kwp.iter().map(|u| (u * scale).min(ac_limit)).sum()
    }

    /// DC scale at which the clipped 1 kWp profile yields `target` kWh.
    ///
    /// The clipped total is continuous and nondecreasing in the scale, so
    /// bisection converges; it saturates at `ac_limit` times the number of
    /// producing hours.
    fn scale_for_yield(&self, target: f64, ac_limit: f64) -> Result<f64> {
        let producing = self.kwh_per_kwp.iter().filter(|u| **u > 0.0).count();
        let ceiling = ac_limit * producing as f64;
        if target >= ceiling {
            return Err(EngineError::input(
                "yield_target",
                format!("{target} kWh/kWp is not reachable under clipping (max {ceiling:.0})"),
            ));
        }

        let mut hi = 1.0;
        while self.clipped_total(hi, ac_limit) < target {
            hi *= 2.0;
        }
        let mut lo = 0.0;
        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            if self.clipped_total(mid, ac_limit) < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(hi)
    }
}

/// Turns site irradiance into hourly AC production.
#[derive(Debug, Clone)]
pub struct ProductionProfileGenerator {
    site: SiteConfig,
    losses: LossFactors,
}

impl ProductionProfileGenerator {
    /// # Errors
    ///
    /// Returns `EngineError::Input` when the site or loss factors are malformed.
    pub fn new(site: SiteConfig, losses: LossFactors) -> Result<Self> {
        site.validate()?;
        losses.validate()?;
        Ok(Self { site, losses })
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn losses(&self) -> &LossFactors {
        &self.losses
    }

    /// DC energy per kWp for one irradiance sample.
    fn unit_energy(&self, sample: &IrradianceSample) -> f64 {
        if sample.planes.is_empty() {
            return 0.0;
        }
        let effective_poa: f64 = sample
            .planes
            .iter()
            .map(|p| {
                let tilt = p.plane.tilt_deg;
                p.plane.share
                    * (p.beam * fresnel_iam(p.aoi_deg)
                        + p.sky_diffuse * fresnel_iam(sky_diffuse_angle(tilt))
                        + p.ground_reflected * fresnel_iam(ground_reflected_angle(tilt)))
            })
            .sum();
        let cell_c = cell_temperature(sample.ambient_c, sample.poa(), self.losses.noct_c);
        let derate = temperature_derate(cell_c, self.losses.temp_coeff_pct_per_c);
        (effective_poa / 1000.0 * derate * self.losses.fixed_factor()).max(0.0)
    }

    /// Per-kWp profile over `timestamps`.
    pub fn unit_profile(&self, timestamps: &[NaiveDateTime]) -> UnitProfile {
        let kwh_per_kwp = timestamps
            .iter()
            .map(|ts| self.unit_energy(&irradiance_at(ts, ts.month0() as usize, &self.site)))
            .collect();
        UnitProfile {
            timestamps: timestamps.to_vec(),
            kwh_per_kwp,
        }
    }

    /// Hourly AC production for one array size.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` for a negative capacity, a non-positive
    /// DC/AC ratio, or malformed timestamps.
    pub fn generate(
        &self,
        capacity_kwp: f64,
        dcac_ratio: f64,
        timestamps: &[NaiveDateTime],
    ) -> Result<TimeSeries> {
        let profile = self.unit_profile(timestamps).production(capacity_kwp, dcac_ratio)?;
        debug!(
            capacity_kwp,
            dcac_ratio,
            annual_kwh = profile.total(),
            "generated production profile"
        );
        Ok(profile)
    }
}

/// Exceedance probability of an annual yield estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum YieldScenario {
    #[default]
    P50,
    P75,
    P90,
}

impl YieldScenario {
    pub fn multiplier(self) -> f64 {
        match self {
            YieldScenario::P50 => 1.00,
            YieldScenario::P75 => 0.96,
            YieldScenario::P90 => 0.92,
        }
    }
}

/// Inputs to [`generate_profile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileRequest {
    pub pv_type: Archetype,
    /// Desired P50 specific yield, kWh/kWp/year. `None` keeps the modelled yield.
    #[serde(default)]
    pub yield_target: Option<f64>,
    #[serde(default)]
    pub dcac_ratio: Option<f64>,
    pub latitude: f64,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_year")]
    pub year: i32,
    #[serde(default)]
    pub scenario: YieldScenario,
}

fn default_year() -> i32 {
    2023
}

/// Per-kWp AC production profile for one archetype.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedProfile {
    pub pv_type: Archetype,
    pub dcac_ratio: f64,
    pub scenario: YieldScenario,
    /// Hourly AC energy for 1 kWp, kWh.
    pub profile: TimeSeries,
    pub specific_yield_kwh_per_kwp: f64,
    /// Share of DC energy lost to inverter clipping, %.
    pub clipping_loss_pct: f64,
}

/// Builds a normalized 1 kWp production profile for an installation archetype.
///
/// When `yield_target` is set the DC profile is rescaled before clipping so
/// that the clipped P50 specific yield matches the target; the scenario
/// multiplier is applied on top. Hourly output never exceeds `1 / dcac_ratio`.
///
/// # Errors
///
/// Returns `EngineError::Input` for malformed coordinates, ratios or targets.
pub fn generate_profile(request: &ProfileRequest) -> Result<GeneratedProfile> {
    let longitude = request.longitude.unwrap_or(0.0);
    let mut site = SiteConfig::for_archetype(request.pv_type, request.latitude, longitude);
    if request.longitude.is_none() {
        site.utc_offset_h = 0.0;
    }
    let dcac_ratio = request
        .dcac_ratio
        .unwrap_or_else(|| request.pv_type.default_dcac_ratio());
    ensure_positive("dcac_ratio", dcac_ratio)?;

    let generator = ProductionProfileGenerator::new(site, LossFactors::default())?;
    let timestamps = hourly_year(request.year)?;
    let unit = generator.unit_profile(&timestamps);
    let ac_limit = 1.0 / dcac_ratio;

    let dc_scale = match request.yield_target {
        Some(target) => {
            ensure_positive("yield_target", target)?;
            if unit.specific_yield() <= 0.0 {
                return Err(EngineError::input(
                    "yield_target",
                    "site produces no energy to normalize",
                ));
            }
            unit.scale_for_yield(target, ac_limit)?
        }
        None => 1.0,
    };
    let multiplier = request.scenario.multiplier();
    let values = unit
        .values()
        .iter()
        .map(|u| (u * dc_scale).min(ac_limit) * multiplier)
        .collect();
    let profile = TimeSeries::new(timestamps, values)?;
    let specific_yield = profile.total();

    let dc_total = unit.specific_yield() * dc_scale;
    let clipping_loss_pct = if dc_total > 0.0 {
        let clipped = dc_total - unit.clipped_total(dc_scale, ac_limit);
        100.0 * clipped / dc_total
    } else {
        0.0
    };

    debug!(
        pv_type = ?request.pv_type,
        specific_yield,
        clipping_loss_pct,
        "generated normalized profile"
    );

    Ok(GeneratedProfile {
        pv_type: request.pv_type,
        dcac_ratio,
        scenario: request.scenario,
        profile,
        specific_yield_kwh_per_kwp: specific_yield,
        clipping_loss_pct,
    })
}
