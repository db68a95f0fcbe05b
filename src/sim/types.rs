//! Core simulation types: readings, derived records, and run outcomes.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Sampling cadence of the meter in simulated seconds.
pub const STEP_S: u64 = 5;
/// Simulated horizon of one run in seconds (one day).
pub const HORIZON_S: u64 = 24 * 60 * 60;
/// Timestamp layout written to the result store.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One meter sample as it travels over the channel.
///
/// Field names on the wire are `time` and `val`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Simulated seconds since midnight.
    #[serde(rename = "time")]
    pub time_s: u64,
    /// Household demand in watts.
    #[serde(rename = "val")]
    pub value_w: f64,
}

impl Reading {
    pub fn new(time_s: u64, value_w: f64) -> Self {
        Self { time_s, value_w }
    }
}

/// One persisted row of the result store.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// Simulation day plus the reading's simulated seconds.
    pub timestamp: NaiveDateTime,
    /// Household demand in watts.
    pub meter_power_w: f64,
    /// PV generation in watts.
    pub pv_power_w: f64,
    /// Net power, always exactly `meter_power_w - pv_power_w`.
    pub sum_power_w: f64,
}

impl ResultRecord {
    /// Derives a record from a reading and the PV power computed for it.
    ///
    /// # Arguments
    ///
    /// * `reading` - Meter sample
    /// * `pv_power_w` - PV generation at the reading's time
    /// * `day` - Simulation day the reading's seconds are counted from
    pub fn derive(reading: &Reading, pv_power_w: f64, day: NaiveDate) -> Self {
        let midnight = day.and_time(NaiveTime::MIN);
        // Out-of-range seconds saturate instead of wrapping into a plausible day.
        let timestamp = i64::try_from(reading.time_s)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|offset| midnight.checked_add_signed(offset))
            .unwrap_or(NaiveDateTime::MAX);
        Self {
            timestamp,
            meter_power_w: reading.value_w,
            pv_power_w,
            sum_power_w: reading.value_w - pv_power_w,
        }
    }

    /// ISO-8601 rendering of the timestamp as stored.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: meter={:.2} W, pv={:.2} W, sum={:.2} W",
            self.timestamp_iso(),
            self.meter_power_w,
            self.pv_power_w,
            self.sum_power_w
        )
    }
}

/// How a generator or aggregator run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The generator exhausted its horizon, or the aggregator saw the end marker.
    Completed,
    /// The shutdown handle fired before the natural end.
    Cancelled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}
