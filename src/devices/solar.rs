use crate::devices::types::{Device, DeviceContext, uniform_noise};
use rand::Rng;

/// Hour of day when generation starts (inclusive).
pub const SUNRISE_H: f64 = 5.4;
/// Hour where the morning linear ramp hands over to the quadratic peak curve.
pub const MORNING_POINT_H: f64 = 8.0;
/// Hour where the quadratic peak curve hands over to the evening linear ramp.
pub const EVENING_POINT_H: f64 = 20.0;
/// Hour of day when generation stops (exclusive).
pub const SUNSET_H: f64 = 20.8;
/// Default amplitude of the peak-hours noise term in watts.
pub const DEFAULT_NOISE_W: f64 = 20.0;

/// Section of the daily PV curve a given instant falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveSegment {
    /// Before sunrise or from sunset onwards; no generation.
    Night,
    /// Rising linear ramp between sunrise and the morning point.
    MorningRamp,
    /// Quadratic curve between the morning and evening points (inclusive).
    Peak,
    /// Falling linear ramp between the evening point and sunset.
    EveningRamp,
}

impl CurveSegment {
    /// Classifies an hour of day.
    pub fn from_hour(x: f64) -> Self {
        if !(SUNRISE_H..SUNSET_H).contains(&x) {
            Self::Night
        } else if x < MORNING_POINT_H {
            Self::MorningRamp
        } else if x > EVENING_POINT_H {
            Self::EveningRamp
        } else {
            Self::Peak
        }
    }
}

/// A solar PV generator following a fixed daily curve.
///
/// `PvModel` maps the time of day to generated power using two linear ramps
/// around a quadratic midday curve. Only the midday segment carries a bounded
/// uniform noise term; everything else is deterministic.
///
/// The output is positive for generation. The evening ramp still yields a few
/// watts just before `SUNSET_H` and then drops to zero; that step is kept.
#[derive(Debug, Clone)]
pub struct PvModel {
    /// Amplitude of the midday noise term in watts.
    pub noise_w: f64,
}

impl Default for PvModel {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_W)
    }
}

impl PvModel {
    /// Creates a PV model with the given midday noise amplitude.
    ///
    /// # Panics
    ///
    /// Panics if `noise_w` is not finite or is negative.
    pub fn new(noise_w: f64) -> Self {
        assert!(noise_w.is_finite() && noise_w >= 0.0);
        Self { noise_w }
    }

    /// Returns the curve segment for a simulated second.
    pub fn segment(&self, timestamp_s: u64) -> CurveSegment {
        CurveSegment::from_hour(DeviceContext::new(timestamp_s).hour_of_day())
    }

    /// Returns the generated power without the noise term.
    pub fn deterministic_power_w(&self, timestamp_s: u64) -> f64 {
        let x = DeviceContext::new(timestamp_s).hour_of_day();
        match CurveSegment::from_hour(x) {
            CurveSegment::Night => 0.0,
            CurveSegment::MorningRamp => 96.0 * x - 520.0,
            CurveSegment::EveningRamp => -531.0 * x + 11050.0,
            CurveSegment::Peak => -13033.3 + 2318.75 * x - 82.29 * x * x,
        }
    }

    /// Returns the generated power at `timestamp_s`, drawing midday noise from `rng`.
    ///
    /// The generator is only consulted inside the peak segment.
    pub fn power_at<R: Rng + ?Sized>(&self, timestamp_s: u64, rng: &mut R) -> f64 {
        let base = self.deterministic_power_w(timestamp_s);
        match self.segment(timestamp_s) {
            CurveSegment::Peak => base + uniform_noise(rng, self.noise_w),
            _ => base,
        }
    }
}

impl Device for PvModel {
    fn power_w<R: Rng + ?Sized>(&self, context: &DeviceContext, rng: &mut R) -> f64 {
        self.power_at(context.time_s, rng)
    }

    fn device_type(&self) -> &'static str {
        "SolarPV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn midnight_produces_nothing() {
        let pv = PvModel::default();
        assert_eq!(pv.power_at(0, &mut rng()), 0.0);
    }

    #[test]
    fn morning_ramp_at_six() {
        let pv = PvModel::default();
        assert_eq!(pv.segment(21_600), CurveSegment::MorningRamp);
        assert_eq!(pv.power_at(21_600, &mut rng()), 56.0);
    }

    #[test]
    fn evening_ramp_at_half_past_eight() {
        let pv = PvModel::default();
        assert_eq!(pv.segment(73_800), CurveSegment::EveningRamp);
        assert_eq!(pv.power_at(73_800, &mut rng()), 164.5);
    }

    #[test]
    fn noon_is_curve_plus_bounded_noise() {
        let pv = PvModel::default();
        let base = pv.deterministic_power_w(43_200);
        assert!((base - 2941.94).abs() < 1e-6, "got {base}");

        let mut r = rng();
        for _ in 0..1000 {
            let p = pv.power_at(43_200, &mut r);
            assert!((2921.94 - 1e-6..=2961.94 + 1e-6).contains(&p), "got {p}");
        }
    }

    #[test]
    fn after_sunset_is_zero() {
        let pv = PvModel::default();
        assert_eq!(pv.segment(75_600), CurveSegment::Night);
        assert_eq!(pv.power_at(75_600, &mut rng()), 0.0);
    }

    #[test]
    fn night_hours_are_zero_across_the_day() {
        let pv = PvModel::default();
        let mut r = rng();
        for t in (0..86_400).step_by(5) {
            let x = t as f64 / 3600.0;
            if x < SUNRISE_H || x >= SUNSET_H {
                assert_eq!(pv.power_at(t, &mut r), 0.0, "t={t}");
            }
        }
    }

    #[test]
    fn segment_boundaries() {
        let pv = PvModel::default();
        // 5.4 h = 19440 s, 8 h = 28800 s, 20 h = 72000 s, 20.8 h = 74880 s
        assert_eq!(pv.segment(19_435), CurveSegment::Night);
        assert_eq!(pv.segment(19_440), CurveSegment::MorningRamp);
        assert_eq!(pv.segment(28_800), CurveSegment::Peak);
        assert_eq!(pv.segment(72_000), CurveSegment::Peak);
        assert_eq!(pv.segment(72_005), CurveSegment::EveningRamp);
        assert_eq!(pv.segment(74_880), CurveSegment::Night);
    }

    #[test]
    fn ramps_do_not_consume_randomness() {
        let pv = PvModel::default();
        let mut a = rng();
        let mut b = rng();
        pv.power_at(21_600, &mut a);
        pv.power_at(73_800, &mut a);
        assert_eq!(pv.power_at(43_200, &mut a), pv.power_at(43_200, &mut b));
    }

    #[test]
    fn deterministic_with_same_seed() {
        let pv = PvModel::default();
        let mut a = rng();
        let mut b = rng();
        for t in (0..86_400).step_by(300) {
            assert_eq!(pv.power_at(t, &mut a), pv.power_at(t, &mut b));
        }
    }

    #[test]
    fn zero_noise_matches_curve() {
        let pv = PvModel::new(0.0);
        let mut r = rng();
        for t in (28_800..=72_000).step_by(600) {
            assert_eq!(pv.power_at(t, &mut r), pv.deterministic_power_w(t));
        }
    }

    #[test]
    #[should_panic]
    fn negative_noise_is_rejected() {
        PvModel::new(-5.0);
    }

    #[test]
    #[should_panic]
    fn infinite_noise_is_rejected() {
        PvModel::new(f64::INFINITY);
    }

    #[test]
    #[should_panic]
    fn nan_noise_is_rejected() {
        PvModel::new(f64::NAN);
    }
}
