//! Techno-economic sizing of photovoltaic plants with optional battery storage.
//!
//! The pipeline runs bottom-up: [`solar`] turns site geometry into hourly
//! production, [`sim`] balances it against consumption hour by hour,
//! [`optimize`] sweeps capacities and picks representative variants,
//! [`finance`] prices them and [`scoring`] ranks competing offers.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod devices;
pub mod error;
pub mod finance;
pub mod io;
pub mod logging;
pub mod optimize;
pub mod scoring;
pub mod series;
/// Hourly energy balance, battery dispatch and degradation.
pub mod sim;
pub mod solar;

pub use error::{EngineError, Result};
