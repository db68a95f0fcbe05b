//! PV side: turns each reading into a persisted net-power record.

use std::io::Write;
use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::channel::{Message, Subscriber};
use crate::devices::{Device, PvModel};
use crate::error::{Result, SimError};
use crate::io::results::ResultStore;
use crate::reporting::RunStats;
use crate::shutdown::Shutdown;
use crate::sim::types::{ResultRecord, RunOutcome, STEP_S};

/// Wait after the end marker before closing the subscription.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(1);

/// Summary of one aggregator run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorReport {
    /// Records appended to the store.
    pub records: usize,
    pub outcome: RunOutcome,
    pub stats: RunStats,
    /// Readings whose time did not follow the previous one by exactly one step.
    pub out_of_order: usize,
}

/// Consumes the reading stream of one queue into a [`ResultStore`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    model: PvModel,
    day: NaiveDate,
    grace: Duration,
    step_s: u64,
}

impl Aggregator {
    /// Aggregator stamping records onto `day`.
    pub fn new(model: PvModel, day: NaiveDate) -> Self {
        Self {
            model,
            day,
            grace: DEFAULT_GRACE,
            step_s: STEP_S,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Cadence used to detect gaps and to integrate PV energy.
    pub fn with_step(mut self, step_s: u64) -> Self {
        self.step_s = step_s;
        self
    }

    /// Processes messages in delivery order until the end marker.
    ///
    /// Each reading is appended to `store` before the next message is taken.
    /// On the end marker the grace delay elapses, then the subscription is
    /// closed. When `shutdown` fires, consumption stops at once and the store
    /// keeps every record written so far.
    ///
    /// # Errors
    ///
    /// - [`SimError::Decode`] on the first body that is not a valid message
    /// - [`SimError::StreamTruncated`] if the transport ends without an end marker
    /// - [`SimError::Store`] or [`SimError::Channel`] on I/O failures
    pub async fn run<S, W, R>(
        &self,
        mut subscriber: S,
        store: &mut ResultStore<W>,
        rng: &mut R,
        mut shutdown: Shutdown,
    ) -> Result<AggregatorReport>
    where
        S: Subscriber,
        W: Write,
        R: Rng + ?Sized,
    {
        let queue = subscriber.queue().to_string();
        info!(
            queue,
            device = self.model.device_type(),
            day = %self.day,
            "pv simulator started"
        );

        let mut stats = RunStats::new(self.step_s);
        let mut out_of_order = 0;
        let mut expected_s = 0;

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.triggered() => break RunOutcome::Cancelled,
                next = subscriber.recv() => next,
            };
            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    abandon(subscriber).await;
                    return Err(SimError::StreamTruncated { queue });
                }
                Err(err) => {
                    abandon(subscriber).await;
                    return Err(err.into());
                }
            };

            let reading = match Message::decode(&delivery.body) {
                Ok(Message::Reading(reading)) => reading,
                Ok(Message::End) => {
                    debug!(
                        queue,
                        grace_ms = self.grace.as_millis() as u64,
                        "end marker received"
                    );
                    tokio::select! {
                        _ = shutdown.triggered() => {}
                        _ = tokio::time::sleep(self.grace) => {}
                    }
                    break RunOutcome::Completed;
                }
                Err(source) => {
                    abandon(subscriber).await;
                    return Err(SimError::Decode { queue, source });
                }
            };

            if reading.time_s != expected_s {
                warn!(
                    queue,
                    expected_s,
                    time_s = reading.time_s,
                    "reading out of sequence"
                );
                out_of_order += 1;
            }
            expected_s = reading.time_s.saturating_add(self.step_s);

            let pv_power_w = self.model.power_at(reading.time_s, rng);
            let record = ResultRecord::derive(&reading, pv_power_w, self.day);
            if let Err(err) = store.append(&record) {
                abandon(subscriber).await;
                return Err(err.into());
            }
            stats.observe(&record);
            debug!(%record, "record stored");
        };

        subscriber.close().await?;

        info!(
            queue,
            records = stats.records,
            out_of_order,
            %outcome,
            peak_pv_w = stats.peak_pv_w,
            pv_energy_kwh = stats.pv_energy_kwh(),
            "pv simulator finished"
        );
        Ok(AggregatorReport {
            records: stats.records,
            outcome,
            stats,
            out_of_order,
        })
    }
}

async fn abandon<S: Subscriber>(subscriber: S) {
    let queue = subscriber.queue().to_string();
    if let Err(err) = subscriber.close().await {
        warn!(queue, error = %err, "failed to close subscription");
    }
}
