//! Deterministic photovoltaic physics: sun position, clear-sky irradiance,
//! plane-of-array transposition and hourly AC production.

pub mod irradiance;
pub mod position;
pub mod production;
pub mod site;

pub use irradiance::{IrradianceSample, irradiance_at};
pub use position::{SolarPosition, solar_position};
pub use production::{
    GeneratedProfile, ProductionProfileGenerator, ProfileRequest, UnitProfile, YieldScenario,
    generate_profile,
};
pub use site::{Archetype, LossFactors, Plane, SiteConfig};
