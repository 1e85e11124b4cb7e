//! Simulated clock.
//!
//! One monotonic clock drives the stepper, scenario creation and expiry,
//! and decision timestamps. It only moves when a tick is applied.

use fleet_domain::SimTime;

/// Monotonic simulated clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimClock {
    now: SimTime,
    ticks: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one frame of `dt_ms` wall milliseconds at `time_scale`.
    pub fn advance(&mut self, dt_ms: f64, time_scale: f64) -> SimTime {
        let scaled = dt_ms * time_scale / 1000.0;
        if scaled.is_finite() && scaled > 0.0 {
            self.now = self.now.plus_secs(scaled);
        }
        self.ticks += 1;
        self.now
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_scales_time() {
        let mut clock = SimClock::new();
        clock.advance(100.0, 2.0);
        clock.advance(100.0, 2.0);
        assert!((clock.now().as_secs() - 0.4).abs() < 1e-9);
        assert_eq!(clock.ticks(), 2);
    }

    #[test]
    fn test_never_moves_backwards() {
        let mut clock = SimClock::new();
        clock.advance(500.0, 1.0);
        clock.advance(-500.0, 1.0);
        clock.advance(f64::NAN, 1.0);
        assert!((clock.now().as_secs() - 0.5).abs() < 1e-9);
    }
}
