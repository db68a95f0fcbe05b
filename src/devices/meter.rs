use crate::devices::types::{Device, DeviceContext};
use rand::Rng;

/// Default upper bound of household demand in watts.
pub const MAX_POWER_W: f64 = 9000.0;

/// A household meter drawing demand uniformly from `[0, max_power_w)`.
///
/// There is no daily pattern; every sample is an independent draw from the
/// caller's generator.
///
/// # Examples
///
/// ```
/// use pv_sim::devices::{Device, DeviceContext, HouseholdMeter};
/// use rand::{SeedableRng, rngs::StdRng};
///
/// let meter = HouseholdMeter::new(9000.0);
/// let mut rng = StdRng::seed_from_u64(42);
/// let w = meter.power_w(&DeviceContext::new(0), &mut rng);
/// assert!((0.0..9000.0).contains(&w));
/// ```
#[derive(Debug, Clone)]
pub struct HouseholdMeter {
    /// Exclusive upper bound of a sample in watts.
    pub max_power_w: f64,
}

impl Default for HouseholdMeter {
    fn default() -> Self {
        Self::new(MAX_POWER_W)
    }
}

impl HouseholdMeter {
    /// Creates a meter with the given exclusive upper bound.
    ///
    /// # Panics
    ///
    /// Panics if `max_power_w` is not finite and strictly positive.
    pub fn new(max_power_w: f64) -> Self {
        assert!(max_power_w.is_finite() && max_power_w > 0.0);
        Self { max_power_w }
    }
}

impl Device for HouseholdMeter {
    fn power_w<R: Rng + ?Sized>(&self, _context: &DeviceContext, rng: &mut R) -> f64 {
        rng.random_range(0.0..self.max_power_w)
    }

    fn device_type(&self) -> &'static str {
        "HouseholdMeter"
    }
}
