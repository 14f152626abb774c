//! Double-impulse detection: two debounced impulses close together form the
//! arming gesture. The window bounds the gap after the first impulse; the
//! reset check runs on every block tick so a lone impulse times out even
//! when no further audio events arrive.

use std::time::{Duration, Instant};

use tracing::debug;

/// Fired when a qualifying impulse pair completes.
#[derive(Debug, Clone, Copy)]
pub struct DoubleImpulse {
    pub at: Instant,
}

/// Counts impulses within a rolling window. `count` is 0 or 1 between calls;
/// the second impulse of a pair fires and resets immediately.
pub struct DoubleImpulseDetector {
    window: Duration,
    count: u8,
    last_impulse: Option<Instant>,
}

impl DoubleImpulseDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            count: 0,
            last_impulse: None,
        }
    }

    /// Reset the pair count when the gap since the first impulse exceeded the
    /// window. Called once per processing block, impulse or not.
    pub fn tick(&mut self, now: Instant) {
        if self.count == 0 {
            return;
        }
        if let Some(last) = self.last_impulse {
            if now.duration_since(last) > self.window {
                debug!("impulse sequence timed out");
                self.count = 0;
            }
        }
    }

    /// Feed one impulse. Returns the event when it completes a pair.
    pub fn observe(&mut self, at: Instant) -> Option<DoubleImpulse> {
        // A stale first impulse resets before counting, in case no tick ran
        // between the two arrivals.
        self.tick(at);

        self.last_impulse = Some(at);
        if self.count == 0 {
            self.count = 1;
            debug!("impulse 1 of 2");
            return None;
        }
        self.count = 0;
        debug!("impulse 2 of 2");
        Some(DoubleImpulse { at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> DoubleImpulseDetector {
        DoubleImpulseDetector::new(Duration::from_millis(1000))
    }

    #[test]
    fn pair_within_window_fires_once() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.observe(t0).is_none());
        let fired = d.observe(t0 + Duration::from_millis(300));
        assert!(fired.is_some());
    }

    #[test]
    fn pair_at_exact_window_edge_fires() {
        // Reset requires strictly more than the window to elapse.
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.observe(t0).is_none());
        assert!(d.observe(t0 + Duration::from_millis(1000)).is_some());
    }

    #[test]
    fn slow_pair_does_not_fire() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.observe(t0).is_none());
        // Second impulse far past the window starts a fresh count instead.
        assert!(d.observe(t0 + Duration::from_millis(1500)).is_none());
        // A quick follow-up now completes the new pair.
        assert!(d.observe(t0 + Duration::from_millis(1700)).is_some());
    }

    #[test]
    fn tick_resets_lone_impulse() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.observe(t0).is_none());
        d.tick(t0 + Duration::from_millis(1200));
        // Count went back to zero: the next impulse is a first, not a second.
        assert!(d.observe(t0 + Duration::from_millis(1250)).is_none());
    }

    #[test]
    fn tick_within_window_keeps_count() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.observe(t0).is_none());
        d.tick(t0 + Duration::from_millis(900));
        assert!(d.observe(t0 + Duration::from_millis(950)).is_some());
    }

    #[test]
    fn third_impulse_starts_fresh_count() {
        let mut d = detector();
        let t0 = Instant::now();
        let step = Duration::from_millis(200);
        assert!(d.observe(t0).is_none());
        assert!(d.observe(t0 + step).is_some());
        // Immediately after firing the count is zero again.
        assert!(d.observe(t0 + step * 2).is_none());
        assert!(d.observe(t0 + step * 3).is_some());
    }
}
