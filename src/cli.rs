use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::{BrokerConfig, ConfigError, SimulationConfig};

/// Meter pause per reading in debug mode, unless one is configured.
pub const DEBUG_PACE_MS: u64 = 1;

/// Household meter and PV simulator.
#[derive(Debug, Parser)]
#[command(name = "pv-sim", version)]
pub struct Cli {
    /// Load configuration from a TOML file
    #[arg(long, global = true, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Use a built-in preset (day, hour)
    #[arg(long, global = true)]
    pub preset: Option<String>,

    /// Log at debug level; the meter also paces its readings
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Broker address overrides shared by the networked commands.
#[derive(Debug, Clone, Default, Args)]
pub struct BrokerArgs {
    /// Broker host
    #[arg(short = 's', long)]
    pub host: Option<String>,

    /// Broker port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Queue name
    #[arg(long)]
    pub queue: Option<String>,
}

impl BrokerArgs {
    fn apply(&self, broker: &mut BrokerConfig) {
        if let Some(host) = &self.host {
            broker.host.clone_from(host);
        }
        if let Some(port) = self.port {
            broker.port = port;
        }
        if let Some(queue) = &self.queue {
            broker.queue.clone_from(queue);
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the relay broker
    Relay {
        #[command(flatten)]
        broker: BrokerArgs,
    },
    /// Publish one day of meter readings to the broker
    Meter {
        #[command(flatten)]
        broker: BrokerArgs,
        /// Seed of the reading generator
        #[arg(long)]
        seed: Option<u64>,
        /// Pause after each reading in milliseconds
        #[arg(long)]
        pace_ms: Option<u64>,
    },
    /// Consume meter readings from the broker into the result file
    Pv {
        #[command(flatten)]
        broker: BrokerArgs,
        /// Result CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed of the PV noise
        #[arg(long)]
        seed: Option<u64>,
        /// Simulation day (YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run meter and PV simulator in one process
    Simulate {
        /// Result CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed of the meter; the PV noise uses seed + 1
        #[arg(long)]
        seed: Option<u64>,
        /// Simulation day (YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print summary statistics of a result file
    Report {
        /// Result CSV path
        path: PathBuf,
    },
}

impl Command {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut SimulationConfig) {
        match self {
            Self::Relay { broker } => broker.apply(&mut config.broker),
            Self::Meter {
                broker,
                seed,
                pace_ms,
            } => {
                broker.apply(&mut config.broker);
                if seed.is_some() {
                    config.meter.seed = *seed;
                }
                if let Some(pace_ms) = pace_ms {
                    config.meter.pace_ms = *pace_ms;
                }
            }
            Self::Pv {
                broker,
                output,
                seed,
                date,
            } => {
                broker.apply(&mut config.broker);
                if let Some(path) = output {
                    config.output.path.clone_from(path);
                }
                if seed.is_some() {
                    config.pv.seed = *seed;
                }
                if date.is_some() {
                    config.output.date = *date;
                }
            }
            Self::Simulate { output, seed, date } => {
                if let Some(path) = output {
                    config.output.path.clone_from(path);
                }
                if let Some(seed) = seed {
                    config.meter.seed = Some(*seed);
                    config.pv.seed = Some(seed.wrapping_add(1));
                }
                if date.is_some() {
                    config.output.date = *date;
                }
            }
            Self::Report { .. } => {}
        }
    }
}

impl Cli {
    /// Resolves the effective configuration: `--config` file, else `--preset`,
    /// else the `day` preset, then command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be loaded or the preset is unknown.
    pub fn load_config(&self) -> Result<SimulationConfig, ConfigError> {
        let mut config = match (&self.config, &self.preset) {
            (Some(path), _) => SimulationConfig::from_toml_file(path)?,
            (None, Some(name)) => SimulationConfig::from_preset(name)?,
            (None, None) => SimulationConfig::day(),
        };
        if self.debug {
            config.logging.level = "debug".to_string();
            if matches!(self.command, Command::Meter { .. }) && config.meter.pace_ms == 0 {
                config.meter.pace_ms = DEBUG_PACE_MS;
            }
        }
        self.command.apply(&mut config);
        Ok(config)
    }
}
