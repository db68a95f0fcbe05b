//! TOML-based run configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::channel::DEFAULT_QUEUE;
use crate::devices::meter::MAX_POWER_W;
use crate::devices::solar::DEFAULT_NOISE_W;
use crate::sim::types::{HORIZON_S, STEP_S};

/// Top-level configuration parsed from TOML.
///
/// All fields have defaults matching the `day` preset. Load from TOML with
/// [`SimulationConfig::from_toml_file`] or use [`SimulationConfig::day`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Broker address and queue.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Reading generator parameters.
    #[serde(default)]
    pub meter: MeterConfig,
    /// PV model and aggregator parameters.
    #[serde(default)]
    pub pv: PvConfig,
    /// Result file location and simulation day.
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Broker address and queue name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Queue shared by meter and PV simulator.
    pub queue: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

impl BrokerConfig {
    /// `host:port` as accepted by the TCP clients and the relay.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reading generator parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeterConfig {
    /// Exclusive upper bound of a reading (W).
    pub max_power_w: f64,
    /// Simulated seconds between readings (must be > 0).
    pub step_s: u64,
    /// Simulated seconds per run (must be > 0).
    pub horizon_s: u64,
    /// Seed of the reading RNG; unseeded runs draw from the OS.
    pub seed: Option<u64>,
    /// Wall-clock pause after each reading (ms); 0 runs flat out.
    pub pace_ms: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            max_power_w: MAX_POWER_W,
            step_s: STEP_S,
            horizon_s: HORIZON_S,
            seed: None,
            pace_ms: 0,
        }
    }
}

impl MeterConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

/// PV model and aggregator parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvConfig {
    /// Noise amplitude during the peak segment (W).
    pub noise_w: f64,
    /// Seed of the PV noise RNG.
    pub seed: Option<u64>,
    /// Wait after the end marker before closing the subscription (ms).
    pub grace_ms: u64,
}

impl Default for PvConfig {
    fn default() -> Self {
        Self {
            noise_w: DEFAULT_NOISE_W,
            seed: None,
            grace_ms: 1000,
        }
    }
}

impl PvConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

/// Result file location and simulation day.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
    /// Day the reading seconds are counted from, as a quoted `"YYYY-MM-DD"`.
    /// Defaults to today's local date.
    pub date: Option<NaiveDate>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("results.csv"),
            date: None,
        }
    }
}

impl OutputConfig {
    /// Configured day, or today.
    pub fn day(&self) -> NaiveDate {
        self.date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Log filter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"pv_sim=debug"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"meter.step_s"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl SimulationConfig {
    /// One simulated day at 5 s cadence.
    pub fn day() -> Self {
        Self::default()
    }

    /// One simulated hour with no grace delay, for quick runs and tests.
    pub fn hour() -> Self {
        Self {
            meter: MeterConfig {
                horizon_s: 3600,
                ..MeterConfig::default()
            },
            pv: PvConfig {
                grace_ms: 0,
                ..PvConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["day", "hour"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "day" => Ok(Self::day()),
            "hour" => Ok(Self::hour()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let b = &self.broker;
        if b.host.trim().is_empty() {
            errors.push(ConfigError::new("broker.host", "must not be empty"));
        }
        if b.port == 0 {
            errors.push(ConfigError::new("broker.port", "must be > 0"));
        }
        if b.queue.trim().is_empty() {
            errors.push(ConfigError::new("broker.queue", "must not be empty"));
        }

        let m = &self.meter;
        if !m.max_power_w.is_finite() || m.max_power_w <= 0.0 {
            errors.push(ConfigError::new("meter.max_power_w", "must be finite and > 0"));
        }
        if m.step_s == 0 {
            errors.push(ConfigError::new("meter.step_s", "must be > 0"));
        }
        if m.horizon_s == 0 {
            errors.push(ConfigError::new("meter.horizon_s", "must be > 0"));
        }

        if !self.pv.noise_w.is_finite() || self.pv.noise_w < 0.0 {
            errors.push(ConfigError::new("pv.noise_w", "must be finite and >= 0"));
        }

        if self.output.path.as_os_str().is_empty() {
            errors.push(ConfigError::new("output.path", "must not be empty"));
        }

        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            errors.push(ConfigError::new(
                "logging.level",
                format!("invalid filter \"{}\": {e}", self.logging.level),
            ));
        }

        errors
    }
}
