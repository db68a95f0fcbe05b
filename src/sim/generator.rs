//! Meter side: emits one reading per cadence step, then the end marker.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::channel::{DeliveryMode, Message, Publisher};
use crate::devices::{Device, DeviceContext, HouseholdMeter};
use crate::error::{Result, SimError};
use crate::shutdown::Shutdown;
use crate::sim::clock::Clock;
use crate::sim::types::{HORIZON_S, Reading, RunOutcome, STEP_S};

/// Summary of one generator run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorReport {
    /// Readings published, not counting the end marker.
    pub readings: usize,
    /// Simulated time of the last published reading.
    pub last_time_s: Option<u64>,
    pub outcome: RunOutcome,
}

/// Produces the ordered reading stream of one simulated day.
#[derive(Debug, Clone)]
pub struct ReadingGenerator {
    meter: HouseholdMeter,
    step_s: u64,
    horizon_s: u64,
    pace: Option<Duration>,
}

impl ReadingGenerator {
    /// Generator over the standard 5 s cadence and one-day horizon.
    pub fn new(meter: HouseholdMeter) -> Self {
        Self {
            meter,
            step_s: STEP_S,
            horizon_s: HORIZON_S,
            pace: None,
        }
    }

    /// Overrides cadence and horizon. `step_s` must be positive.
    pub fn with_timing(mut self, step_s: u64, horizon_s: u64) -> Self {
        self.step_s = step_s;
        self.horizon_s = horizon_s;
        self
    }

    /// Sleeps `pace` of wall time after each reading. Zero disables pacing.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = (!pace.is_zero()).then_some(pace);
        self
    }

    /// Publishes every reading of the horizon in order, then exactly one
    /// durable end marker, then closes the publisher.
    ///
    /// The end marker is sent no matter how the loop ended: horizon exhausted,
    /// shutdown observed between readings, or a failed publish. In the last
    /// case the publish error is returned after the marker attempt.
    ///
    /// # Errors
    ///
    /// Returns the first transport or encoding failure.
    pub async fn run<P, R>(
        &self,
        mut publisher: P,
        rng: &mut R,
        mut shutdown: Shutdown,
    ) -> Result<GeneratorReport>
    where
        P: Publisher,
        R: Rng + ?Sized,
    {
        let queue = publisher.queue().to_string();
        info!(
            queue,
            device = self.meter.device_type(),
            step_s = self.step_s,
            horizon_s = self.horizon_s,
            "meter started"
        );

        let mut clock = Clock::new(0, self.horizon_s, self.step_s);
        let mut readings = 0;
        let mut last_time_s = None;
        let mut outcome = RunOutcome::Completed;
        let mut failure: Option<SimError> = None;

        while let Some(t) = clock.tick() {
            if shutdown.is_triggered() {
                outcome = RunOutcome::Cancelled;
                break;
            }

            let value_w = self.meter.power_w(&DeviceContext::new(t), rng);
            let body = match Message::Reading(Reading::new(t, value_w)).encode() {
                Ok(body) => body,
                Err(err) => {
                    failure = Some(SimError::Encode(err));
                    break;
                }
            };
            if let Err(err) = publisher.publish(&body, DeliveryMode::Transient).await {
                failure = Some(err.into());
                break;
            }
            readings += 1;
            last_time_s = Some(t);
            debug!(time_s = t, value_w, "reading published");

            if let Some(pace) = self.pace {
                tokio::select! {
                    _ = shutdown.triggered() => {}
                    _ = tokio::time::sleep(pace) => {}
                }
            }
        }

        let sent = match Message::End.encode() {
            Ok(body) => publisher
                .publish(&body, DeliveryMode::Durable)
                .await
                .map_err(SimError::from),
            Err(err) => Err(SimError::Encode(err)),
        };
        let closed = publisher.close().await;

        if let Some(err) = failure {
            if let Err(end_err) = sent {
                warn!(queue, error = %end_err, "end marker not delivered");
            }
            return Err(err);
        }
        sent?;
        closed?;

        info!(queue, readings, %outcome, "meter finished");
        Ok(GeneratorReport {
            readings,
            last_time_s,
            outcome,
        })
    }
}
