/// A simulation clock that walks simulated seconds at a fixed cadence.
///
/// The `Clock` yields `start, start + step, …` while the value stays below
/// `end`, so a day at 5 s cadence produces 17 280 ticks.
///
/// # Examples
///
/// ```
/// use pv_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(0, 15, 5);
/// let mut ticks = Vec::new();
///
/// while let Some(t) = clock.tick() {
///     ticks.push(t);
/// }
/// assert_eq!(ticks, vec![0, 5, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next simulated second to hand out
    current: u64,
    /// Exclusive end of the simulated span
    end: u64,
    /// Distance between two ticks in seconds
    step: u64,
}

impl Clock {
    /// Creates a clock covering `[start, end)` in increments of `step`.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero.
    pub fn new(start: u64, end: u64, step: u64) -> Self {
        assert!(step > 0, "step must be > 0");
        Self {
            current: start,
            end,
            step,
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(t)` - The simulated second before advancing
    /// * `None` - If the clock has reached its end
    pub fn tick(&mut self) -> Option<u64> {
        if self.current < self.end {
            let t = self.current;
            self.current = self.current.saturating_add(self.step);
            Some(t)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock() {
        let mut clock = Clock::new(0, 86_400, 5);
        assert_eq!(clock.current, 0);
        assert_eq!(clock.end, 86_400);
        assert_eq!(std::iter::from_fn(|| clock.tick()).count(), 17_280);
    }

    #[test]
    fn test_tick() {
        let mut clock = Clock::new(0, 10, 5);
        assert_eq!(clock.tick(), Some(0));
        assert_eq!(clock.tick(), Some(5));
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_uneven_end() {
        let mut clock = Clock::new(0, 11, 5);
        let ticks: Vec<u64> = std::iter::from_fn(|| clock.tick()).collect();
        assert_eq!(ticks, vec![0, 5, 10]);
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = Clock::new(0, 0, 5);
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.tick(), None);
    }

    #[test]
    #[should_panic]
    fn test_zero_step_panics() {
        Clock::new(0, 10, 0);
    }
}
