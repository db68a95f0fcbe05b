//! Household meter and photovoltaic simulator.
//!
//! A meter produces one demand reading every few simulated seconds and
//! publishes it on an ordered queue. The PV simulator consumes the queue,
//! computes solar generation for each reading's time of day and appends the
//! net power to a CSV result file.

pub mod channel;
pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
pub mod io;
pub mod logging;
pub mod reporting;
pub mod runner;
pub mod shutdown;
/// Readings, the simulation clock, and the generator and aggregator loops.
pub mod sim;
