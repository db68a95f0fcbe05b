//! Simulated power sources feeding the meter/PV pipeline.

/// Household demand meter.
pub mod meter;
/// Solar photovoltaic generation curve.
pub mod solar;
pub mod types;

pub use meter::HouseholdMeter;
pub use solar::{CurveSegment, PvModel};
pub use types::Device;
pub use types::DeviceContext;
