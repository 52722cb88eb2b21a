//! Hourly device models taking part in the site energy balance.

/// Stationary battery storage model.
pub mod battery;
/// Synthetic facility demand generator.
pub mod demand;
pub mod types;

pub use battery::Battery;
pub use demand::{DemandProfile, SyntheticDemand};
pub use types::{Device, DeviceContext};
