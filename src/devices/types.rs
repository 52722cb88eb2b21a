//! Busbar convention shared by hourly device models.

use chrono::NaiveDateTime;

/// One hourly step as seen by a device.
pub struct DeviceContext {
    /// Start of the hour.
    pub at: NaiveDateTime,
    /// Requested energy for controllable devices, kWh. Positive draws from
    /// the busbar, negative supplies it.
    pub setpoint_kwh: Option<f64>,
}

impl DeviceContext {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            at,
            setpoint_kwh: None,
        }
    }

    pub fn with_setpoint(at: NaiveDateTime, setpoint_kwh: f64) -> Self {
        Self {
            at,
            setpoint_kwh: Some(setpoint_kwh),
        }
    }
}

/// A device exchanging energy with the site busbar once per hour.
///
/// Positive values are drawn from the busbar (load, battery charging);
/// negative values are supplied to it.
pub trait Device {
    /// Energy actually exchanged during the hour, kWh.
    fn energy_kwh(&mut self, context: &DeviceContext) -> f64;
}
