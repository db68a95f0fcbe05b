pub mod aggregator;
/// Simulated time stepping.
pub mod clock;
pub mod generator;
pub mod types;
