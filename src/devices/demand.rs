use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::devices::types::{Device, DeviceContext};
use crate::error::{Result, ensure_in_range, ensure_non_negative};
use crate::series::TimeSeries;

/// Box-Muller sample from a zero-mean Gaussian with `std_dev`.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}

/// Parameters of a synthetic facility demand profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemandProfile {
    /// Average hourly demand (kW).
    pub base_kw: f64,
    /// Amplitude of the daily sinusoid (kW).
    pub daily_amp_kw: f64,
    /// Hour of day at which the daily sinusoid peaks.
    pub peak_hour: f64,
    /// Multiplier applied on Saturdays and Sundays.
    pub weekend_factor: f64,
    /// Relative winter/summer swing (0.2 = +20% mid-winter, -20% mid-summer).
    pub seasonal_swing: f64,
    /// Standard deviation of the Gaussian noise (kW).
    pub noise_std_kw: f64,
    pub seed: u64,
}

impl Default for DemandProfile {
    fn default() -> Self {
        Self {
            base_kw: 120.0,
            daily_amp_kw: 60.0,
            peak_hour: 13.0,
            weekend_factor: 0.55,
            seasonal_swing: 0.15,
            noise_std_kw: 5.0,
            seed: 42,
        }
    }
}

impl DemandProfile {
    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first malformed parameter.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("demand.base_kw", self.base_kw)?;
        ensure_non_negative("demand.daily_amp_kw", self.daily_amp_kw)?;
        ensure_in_range("demand.peak_hour", self.peak_hour, 0.0, 24.0)?;
        ensure_in_range("demand.weekend_factor", self.weekend_factor, 0.0, 5.0)?;
        ensure_in_range("demand.seasonal_swing", self.seasonal_swing, 0.0, 1.0)?;
        ensure_non_negative("demand.noise_std_kw", self.noise_std_kw)?;
        Ok(())
    }
}

/// A seeded generator of commercial-facility hourly demand.
///
/// Demand is the sum of a baseline, a daily sinusoid peaking at
/// `peak_hour`, and Gaussian noise; the result is scaled by a cosine
/// seasonal factor (maximum in mid-January) and by `weekend_factor` on
/// weekends. Output is never negative.
///
/// # Examples
///
/// ```
/// use pv_sizer::devices::demand::{DemandProfile, SyntheticDemand};
/// use pv_sizer::series::hourly_year;
///
/// let mut demand = SyntheticDemand::new(&DemandProfile::default());
/// let series = demand.series(&hourly_year(2023).unwrap()).unwrap();
/// assert_eq!(series.len(), 8760);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticDemand {
    profile: DemandProfile,
    rng: StdRng,
}

impl SyntheticDemand {
    pub fn new(profile: &DemandProfile) -> Self {
        Self {
            profile: profile.clone(),
            rng: StdRng::seed_from_u64(profile.seed),
        }
    }

    /// Demand for the hour starting at `at`, kWh.
    pub fn demand_kwh(&mut self, at: &NaiveDateTime) -> f64 {
        let p = &self.profile;
        let hour = f64::from(at.hour()) + 0.5;
        let daily = (2.0 * std::f64::consts::PI * (hour - p.peak_hour) / 24.0).cos();
        let season_angle = 2.0 * std::f64::consts::PI * f64::from(at.ordinal0()) / 365.0;
        let seasonal = 1.0 + p.seasonal_swing * (season_angle - 0.25).cos();
        let weekend = match at.weekday() {
            Weekday::Sat | Weekday::Sun => p.weekend_factor,
            _ => 1.0,
        };
        let noise = gaussian_noise(&mut self.rng, p.noise_std_kw);
        ((p.base_kw + p.daily_amp_kw * daily + noise) * seasonal * weekend).max(0.0)
    }

    /// Demand over every hour of `timestamps`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` if `timestamps` is not a valid hourly sequence.
    pub fn series(&mut self, timestamps: &[NaiveDateTime]) -> Result<TimeSeries> {
        let values = timestamps
            .iter()
            .map(|at| self.energy_kwh(&DeviceContext::new(*at)))
            .collect();
        TimeSeries::new(timestamps.to_vec(), values)
    }
}

impl Device for SyntheticDemand {
    fn energy_kwh(&mut self, context: &DeviceContext) -> f64 {
        self.demand_kwh(&context.at)
    }
}
