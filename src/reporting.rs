//! Summary statistics over aggregated records.

use std::fmt;

use crate::sim::types::ResultRecord;

/// Running statistics of one aggregation run.
///
/// Updated record by record with [`RunStats::observe`], or computed post-hoc
/// from a result file with [`RunStats::from_records`]. Both paths give the same
/// numbers for the same records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Number of records observed.
    pub records: usize,
    /// Highest household demand (W).
    pub peak_meter_w: f64,
    /// Highest PV generation (W).
    pub peak_pv_w: f64,
    /// Lowest net power (W); negative means export.
    pub min_net_w: f64,
    /// Highest net power (W).
    pub max_net_w: f64,
    /// PV energy over the observed records (Wh), each record held for `step_s`.
    pub pv_energy_wh: f64,
    step_s: u64,
}

impl RunStats {
    /// Creates empty statistics for records spaced `step_s` seconds apart.
    pub fn new(step_s: u64) -> Self {
        Self {
            step_s,
            ..Self::default()
        }
    }

    /// Folds one record into the statistics.
    pub fn observe(&mut self, record: &ResultRecord) {
        if self.records == 0 {
            self.min_net_w = record.sum_power_w;
            self.max_net_w = record.sum_power_w;
        } else {
            self.min_net_w = self.min_net_w.min(record.sum_power_w);
            self.max_net_w = self.max_net_w.max(record.sum_power_w);
        }
        self.records += 1;
        self.peak_meter_w = self.peak_meter_w.max(record.meter_power_w);
        self.peak_pv_w = self.peak_pv_w.max(record.pv_power_w);
        self.pv_energy_wh += record.pv_power_w * self.step_s as f64 / 3600.0;
    }

    /// Computes statistics over a complete record set.
    ///
    /// # Arguments
    ///
    /// * `records` - Records in store order
    /// * `step_s` - Spacing between records in seconds
    pub fn from_records(records: &[ResultRecord], step_s: u64) -> Self {
        let mut stats = Self::new(step_s);
        for record in records {
            stats.observe(record);
        }
        stats
    }

    /// PV energy in kWh.
    pub fn pv_energy_kwh(&self) -> f64 {
        self.pv_energy_wh / 1000.0
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Report ---")?;
        writeln!(f, "Records:          {}", self.records)?;
        writeln!(f, "Peak meter:       {:.2} W", self.peak_meter_w)?;
        writeln!(f, "Peak PV:          {:.2} W", self.peak_pv_w)?;
        writeln!(
            f,
            "Net power range:  {:.2} W .. {:.2} W",
            self.min_net_w, self.max_net_w
        )?;
        write!(f, "PV energy:        {:.3} kWh", self.pv_energy_kwh())
    }
}
