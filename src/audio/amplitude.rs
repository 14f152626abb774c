//! Amplitude classification: one RMS value per audio block, thresholded and
//! debounced into discrete impulse events.

use std::time::{Duration, Instant};

use tracing::debug;

/// RMS floor above which per-block loudness is logged (tuning aid only).
const REPORT_FLOOR: f32 = 0.1;

/// A debounced loud-sound detection at a known instant.
#[derive(Debug, Clone, Copy)]
pub struct Impulse {
    pub at: Instant,
}

/// RMS over a block of PCM i16 samples, normalized to [-1.0, 1.0].
/// An empty block has no defined RMS and reads as silence.
#[inline]
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let f = s as f64 / 32768.0;
            f * f
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Classifies audio blocks into impulses: RMS above threshold, with a fixed
/// debounce gap between consecutive emissions.
pub struct AmplitudeClassifier {
    threshold: f32,
    debounce: Duration,
    last_impulse: Option<Instant>,
}

impl AmplitudeClassifier {
    pub fn new(threshold: f32, debounce: Duration) -> Self {
        Self {
            threshold,
            debounce,
            last_impulse: None,
        }
    }

    /// Classify one block. Emits an impulse iff the block RMS exceeds the
    /// threshold and the debounce gap since the last emission has passed.
    /// Empty blocks emit nothing.
    pub fn classify(&mut self, block: &[i16], now: Instant) -> Option<Impulse> {
        if block.is_empty() {
            return None;
        }
        let rms = compute_rms(block);

        if rms > REPORT_FLOOR {
            debug!(rms, "loudness");
        }

        if rms <= self.threshold {
            return None;
        }
        if let Some(last) = self.last_impulse {
            if now.duration_since(last) <= self.debounce {
                return None;
            }
        }
        self.last_impulse = Some(now);
        debug!(rms, "impulse");
        Some(Impulse { at: now })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(value: i16, len: usize) -> Vec<i16> {
        vec![value; len]
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(compute_rms(&block_of(0, 320)), 0.0);
    }

    #[test]
    fn rms_of_full_scale_is_near_one() {
        let rms = compute_rms(&block_of(i16::MIN, 320));
        assert!((rms - 1.0).abs() < 0.001, "rms was {rms}");
    }

    #[test]
    fn rms_of_half_scale() {
        let rms = compute_rms(&block_of(16384, 320));
        assert!((rms - 0.5).abs() < 0.001, "rms was {rms}");
    }

    #[test]
    fn empty_block_emits_nothing() {
        let mut c = AmplitudeClassifier::new(0.0, Duration::from_millis(100));
        assert!(c.classify(&[], Instant::now()).is_none());
    }

    #[test]
    fn below_threshold_never_emits() {
        let mut c = AmplitudeClassifier::new(0.5, Duration::from_millis(100));
        let quiet = block_of(8000, 320); // RMS ~0.24
        assert!(c.classify(&quiet, Instant::now()).is_none());
    }

    #[test]
    fn at_threshold_does_not_emit() {
        // Strictly greater-than: RMS exactly at the threshold is not an impulse.
        let mut c = AmplitudeClassifier::new(1.0, Duration::from_millis(100));
        let full = block_of(i16::MIN, 320); // RMS 1.0
        assert!(c.classify(&full, Instant::now()).is_none());
    }

    #[test]
    fn loud_block_emits_impulse() {
        let mut c = AmplitudeClassifier::new(0.5, Duration::from_millis(100));
        let loud = block_of(24000, 320); // RMS ~0.73
        let now = Instant::now();
        let impulse = c.classify(&loud, now).expect("impulse");
        assert_eq!(impulse.at, now);
    }

    #[test]
    fn debounce_suppresses_rapid_repeat() {
        let mut c = AmplitudeClassifier::new(0.5, Duration::from_millis(100));
        let loud = block_of(24000, 320);
        let t0 = Instant::now();
        assert!(c.classify(&loud, t0).is_some());
        // Exactly at the debounce gap: still suppressed (strictly greater required).
        assert!(c
            .classify(&loud, t0 + Duration::from_millis(100))
            .is_none());
        assert!(c
            .classify(&loud, t0 + Duration::from_millis(101))
            .is_some());
    }
}
