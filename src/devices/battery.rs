use crate::devices::types::{Device, DeviceContext};
use crate::sim::types::BessConfig;

/// A battery energy storage system exchanging energy with the site busbar.
///
/// `Battery` tracks stored energy between the configured SoC bounds and
/// enforces the power limit on every hourly step. The full round-trip
/// efficiency is applied when discharging: charging stores energy 1:1 and
/// every delivered kWh draws `1 / efficiency` kWh from storage.
///
/// # Energy Convention (Busbar)
/// - Positive energy: Charging (drawn from the busbar)
/// - Negative energy: Discharging (supplied to the busbar)
#[derive(Debug, Clone)]
pub struct Battery {
    /// Nameplate energy in kilowatt-hours.
    pub energy_kwh: f64,

    /// Stored energy in kilowatt-hours.
    pub soc_kwh: f64,

    /// Charge and discharge power limit in kilowatts (1 h step, so also kWh).
    pub power_kw: f64,

    /// Round-trip efficiency (0..1.0].
    pub efficiency: f64,

    /// Lower bound of stored energy (kWh).
    floor_kwh: f64,

    /// Upper bound of stored energy (kWh).
    ceiling_kwh: f64,
}

impl Battery {
    /// Creates an empty battery (stored energy at the lower SoC bound).
    ///
    /// # Arguments
    ///
    /// * `config` - Validated battery parameters
    pub fn new(config: &BessConfig) -> Self {
        let floor_kwh = config.soc_min * config.energy_kwh;
        Self {
            energy_kwh: config.energy_kwh,
            soc_kwh: floor_kwh,
            power_kw: config.power_kw,
            efficiency: config.round_trip_efficiency,
            floor_kwh,
            ceiling_kwh: config.soc_max * config.energy_kwh,
        }
    }

    /// Energy that could be absorbed this hour, kWh.
    fn charge_headroom_kwh(&self) -> f64 {
        (self.ceiling_kwh - self.soc_kwh).max(0.0).min(self.power_kw)
    }

    /// Energy that could be delivered this hour, kWh.
    fn discharge_available_kwh(&self) -> f64 {
        ((self.soc_kwh - self.floor_kwh).max(0.0) * self.efficiency).min(self.power_kw)
    }
}

impl Device for Battery {
    /// Returns the energy actually exchanged given a setpoint in busbar convention.
    ///
    /// # Energy Convention (Busbar)
    /// - Positive setpoint/return: Charging
    /// - Negative setpoint/return: Discharging
    ///
    /// Enforces the power limit, SoC bounds, and discharge losses.
    fn energy_kwh(&mut self, context: &DeviceContext) -> f64 {
        let setpoint_kwh = context.setpoint_kwh.unwrap_or(0.0);

        if setpoint_kwh > 0.0 {
            let actual = setpoint_kwh.min(self.charge_headroom_kwh());
            self.soc_kwh = (self.soc_kwh + actual).min(self.ceiling_kwh);
            actual
        } else if setpoint_kwh < 0.0 {
            let delivered = (-setpoint_kwh).min(self.discharge_available_kwh());
            self.soc_kwh = (self.soc_kwh - delivered / self.efficiency).max(self.floor_kwh);
            -delivered
        } else {
            0.0
        }
    }
}
