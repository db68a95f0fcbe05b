//! Common types and traits for simulated power sources.

use rand::Rng;

/// Contextual information passed to devices when they are sampled.
///
/// # Fields
/// * `time_s` - Simulated seconds since midnight of the simulation day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceContext {
    pub time_s: u64,
}

impl DeviceContext {
    /// Creates a new DeviceContext for the given simulated second.
    pub fn new(time_s: u64) -> Self {
        Self { time_s }
    }

    /// Hour of day as a real number (`time_s / 3600`).
    pub fn hour_of_day(&self) -> f64 {
        self.time_s as f64 / 3600.0
    }
}

/// Trait defining a device that produces or consumes electricity.
///
/// Devices are stateless: every source of randomness comes from the
/// caller-supplied generator so that runs can be reproduced from a seed.
pub trait Device {
    /// Returns the power in watts at the sampled instant.
    ///
    /// # Arguments
    ///
    /// * `context` - Sample instant
    /// * `rng` - Random source for any noise term
    fn power_w<R: Rng + ?Sized>(&self, context: &DeviceContext, rng: &mut R) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Draws bounded uniform noise from `[-amplitude, amplitude]`.
///
/// Returns `0.0` without touching the generator when `amplitude <= 0`.
pub fn uniform_noise<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        return 0.0;
    }
    rng.random_range(-amplitude..=amplitude)
}
