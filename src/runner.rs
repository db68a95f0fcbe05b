//! Config-driven construction and execution of the meter, PV simulator and relay.

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info};

use crate::channel::InMemoryBroker;
use crate::channel::relay::Relay;
use crate::channel::tcp::{TcpPublisher, TcpSubscriber};
use crate::config::SimulationConfig;
use crate::devices::{HouseholdMeter, PvModel};
use crate::error::{Result, SimError};
use crate::io::results::{ResultStore, load_records};
use crate::reporting::RunStats;
use crate::shutdown::Shutdown;
use crate::sim::aggregator::{Aggregator, AggregatorReport};
use crate::sim::generator::{GeneratorReport, ReadingGenerator};

/// Reports of both sides of an in-process run.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub generator: GeneratorReport,
    pub aggregator: AggregatorReport,
}

/// Seeded RNG when a seed is configured, OS-seeded otherwise.
pub fn rng_from(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

/// Runs [`SimulationConfig::validate`] and logs every violation.
///
/// # Errors
///
/// Returns the first violation as [`SimError::Config`].
pub fn validate(config: &SimulationConfig) -> Result<()> {
    let errors = config.validate();
    for e in &errors {
        error!(field = %e.field, "{}", e.message);
    }
    match errors.into_iter().next() {
        Some(first) => Err(first.into()),
        None => Ok(()),
    }
}

/// Builds the reading generator described by `config.meter`.
pub fn generator(config: &SimulationConfig) -> ReadingGenerator {
    let m = &config.meter;
    ReadingGenerator::new(HouseholdMeter::new(m.max_power_w))
        .with_timing(m.step_s, m.horizon_s)
        .with_pace(m.pace())
}

/// Builds the aggregator described by `config.pv` and `config.output`.
pub fn aggregator(config: &SimulationConfig) -> Aggregator {
    Aggregator::new(PvModel::new(config.pv.noise_w), config.output.day())
        .with_grace(config.pv.grace())
        .with_step(config.meter.step_s)
}

/// Runs meter and PV simulator as two tasks over an in-memory broker.
///
/// The result file at `config.output.path` is truncated first.
///
/// # Errors
///
/// Returns the meter's error if it failed, otherwise the PV simulator's.
pub async fn simulate(config: &SimulationConfig, shutdown: Shutdown) -> Result<SimulationOutcome> {
    validate(config)?;
    let queue = config.broker.queue.as_str();
    let broker = InMemoryBroker::new();
    let subscriber = broker.subscribe(queue)?;
    let publisher = broker.publisher(queue);
    let mut store = ResultStore::create(&config.output.path)?;
    info!(path = %config.output.path.display(), "writing results");

    let generator = generator(config);
    let aggregator = aggregator(config);
    let mut meter_rng = rng_from(config.meter.seed);
    let mut pv_rng = rng_from(config.pv.seed);

    let meter_shutdown = shutdown.clone();
    let meter = tokio::spawn(async move {
        generator
            .run(publisher, &mut meter_rng, meter_shutdown)
            .await
    });
    let pv = tokio::spawn(async move {
        aggregator
            .run(subscriber, &mut store, &mut pv_rng, shutdown)
            .await
    });

    let (meter, pv) = tokio::join!(meter, pv);
    let generator = meter.map_err(|e| SimError::Task {
        task: "meter",
        message: e.to_string(),
    })??;
    let aggregator = pv.map_err(|e| SimError::Task {
        task: "pv",
        message: e.to_string(),
    })??;

    Ok(SimulationOutcome {
        generator,
        aggregator,
    })
}

/// Publishes one run of readings to the relay at `config.broker`.
pub async fn run_meter(config: &SimulationConfig, shutdown: Shutdown) -> Result<GeneratorReport> {
    validate(config)?;
    let b = &config.broker;
    let publisher = TcpPublisher::connect(&b.addr(), &b.queue).await?;
    let mut rng = rng_from(config.meter.seed);
    generator(config).run(publisher, &mut rng, shutdown).await
}

/// Consumes one run of readings from the relay into the result file.
pub async fn run_pv(config: &SimulationConfig, shutdown: Shutdown) -> Result<AggregatorReport> {
    validate(config)?;
    let b = &config.broker;
    let subscriber = TcpSubscriber::connect(&b.addr(), &b.queue).await?;
    let mut store = ResultStore::create(&config.output.path)?;
    info!(path = %config.output.path.display(), "writing results");
    let mut rng = rng_from(config.pv.seed);
    aggregator(config)
        .run(subscriber, &mut store, &mut rng, shutdown)
        .await
}

/// Serves the relay broker until `shutdown` fires.
pub async fn run_relay(config: &SimulationConfig, shutdown: Shutdown) -> Result<()> {
    validate(config)?;
    let relay = Relay::bind(&config.broker.addr()).await?;
    relay.serve(shutdown).await?;
    Ok(())
}

/// Summarises an existing result file.
pub fn report(path: &Path, step_s: u64) -> Result<RunStats> {
    let records = load_records(path)?;
    Ok(RunStats::from_records(&records, step_s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn seeded_rngs_repeat() {
        let (mut x, mut y) = (rng_from(Some(5)), rng_from(Some(5)));
        let a: Vec<u32> = (0..4).map(|_| x.random()).collect();
        let b: Vec<u32> = (0..4).map(|_| y.random()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn validate_reports_first_violation() {
        let mut config = SimulationConfig::day();
        config.meter.step_s = 0;
        let res = validate(&config);
        assert!(matches!(res, Err(SimError::Config(ref e)) if e.field == "meter.step_s"));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_io() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let mut config = SimulationConfig::hour();
        config.output.path = dir.path().join("results.csv");
        config.pv.noise_w = -5.0;

        let res = simulate(&config, Shutdown::never()).await;
        assert!(matches!(res, Err(SimError::Config(_))));
        assert!(!config.output.path.exists());
    }

    #[test]
    fn report_on_missing_file_is_a_store_error() {
        let res = report(Path::new("/nonexistent/results.csv"), 5);
        assert!(matches!(res, Err(SimError::Store(_))));
    }
}
