//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;

use chrono::NaiveDate;
use pv_sim::channel::relay::Relay;
use pv_sim::config::SimulationConfig;
use pv_sim::shutdown::{Shutdown, ShutdownTrigger};

/// Simulation day used by all fixtures.
pub fn fixed_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 21).expect("valid date")
}

/// One simulated hour with fixed seeds and day, writing to `dir/name`.
pub fn hour_config(dir: &Path, name: &str) -> SimulationConfig {
    let mut config = SimulationConfig::hour();
    config.meter.seed = Some(42);
    config.pv.seed = Some(43);
    config.output.date = Some(fixed_day());
    config.output.path = dir.join(name);
    config
}

/// Binds a relay on an ephemeral loopback port and serves it in the background.
///
/// Returns the bound port and the trigger that stops the relay.
pub async fn start_relay() -> (u16, ShutdownTrigger) {
    let relay = Relay::bind("127.0.0.1:0")
        .await
        .expect("relay bind should succeed");
    let port = relay
        .local_addr()
        .expect("bound relay should have an address")
        .port();
    let (trigger, shutdown) = Shutdown::pair();
    tokio::spawn(relay.serve(shutdown));
    (port, trigger)
}

/// Points `config` at a relay on loopback `port`.
pub fn use_relay(config: &mut SimulationConfig, port: u16) {
    config.broker.host = "127.0.0.1".to_string();
    config.broker.port = port;
}

/// Reads a result file as text.
pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("result file should be readable")
}
