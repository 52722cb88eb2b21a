/// Battery capacity fade over the project horizon.
pub mod degradation;
pub mod dispatch;
pub mod kpi;
pub mod types;

pub use degradation::{BessDegradation, CapacityTrajectory};
pub use dispatch::{estimate_baseline_without_bess, simulate, simulate_hourly};
pub use types::{BessConfig, BessStatus, CapacityScenario, ExportMode, HourRecord, SimulationResult};
