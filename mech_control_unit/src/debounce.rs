//! Minimum-duration filter for noisy digital sensors.
//!
//! Converts a noisy boolean stream into a stable asserted signal: the raw
//! input must be continuously true for at least the configured duration
//! before the filter confirms; any false sample clears the run immediately.
//!
//! Modeled as an explicit phase machine (`Unset → Counting → Confirmed`)
//! so the reset-on-any-false rule has exactly one home. The boundary
//! comparison is `>=`: a run of length exactly `min_duration` confirms.

use std::time::Duration;

/// Internal phase of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No assertion run in progress.
    Unset,
    /// Raw input asserted since `since`, not yet long enough.
    Counting {
        /// Start of the current unbroken assertion run.
        since: Duration,
    },
    /// Run reached `min_duration`; output is true.
    Confirmed,
}

/// Debounce filter over one noisy boolean sensor.
#[derive(Debug, Clone)]
pub struct DebounceFilter {
    min_duration: Duration,
    phase: Phase,
}

impl DebounceFilter {
    /// Create a filter requiring `min_duration` of continuous assertion.
    pub const fn new(min_duration: Duration) -> Self {
        Self {
            min_duration,
            phase: Phase::Unset,
        }
    }

    /// Feed one raw sample at monotonic time `now`. Returns the debounced
    /// output for this sample.
    ///
    /// Tolerates irregular call intervals; only `now - run_start` matters.
    pub fn update(&mut self, raw: bool, now: Duration) -> bool {
        if !raw {
            self.phase = Phase::Unset;
            return false;
        }
        match self.phase {
            Phase::Unset => {
                if self.min_duration.is_zero() {
                    self.phase = Phase::Confirmed;
                } else {
                    self.phase = Phase::Counting { since: now };
                }
            }
            Phase::Counting { since } => {
                if now.saturating_sub(since) >= self.min_duration {
                    self.phase = Phase::Confirmed;
                }
            }
            Phase::Confirmed => {}
        }
        self.is_confirmed()
    }

    /// Most recently computed debounced output.
    #[inline]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self.phase, Phase::Confirmed)
    }

    /// Clear any run in progress.
    #[inline]
    pub fn reset(&mut self) {
        self.phase = Phase::Unset;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MS: fn(u64) -> Duration = Duration::from_millis;

    #[test]
    fn short_run_stays_false() {
        let mut f = DebounceFilter::new(MS(100));
        assert!(!f.update(true, MS(0)));
        assert!(!f.update(true, MS(50)));
        assert!(!f.update(true, MS(99)));
    }

    #[test]
    fn confirms_exactly_at_boundary() {
        let mut f = DebounceFilter::new(MS(100));
        assert!(!f.update(true, MS(0)));
        // Boundary convention is >=: exactly min_duration confirms.
        assert!(f.update(true, MS(100)));
        assert!(f.is_confirmed());
    }

    #[test]
    fn false_sample_resets_run() {
        let mut f = DebounceFilter::new(MS(100));
        f.update(true, MS(0));
        f.update(true, MS(90));
        assert!(!f.update(false, MS(95)));
        assert!(!f.is_confirmed());
        // A fresh full-length run is required afterward.
        assert!(!f.update(true, MS(100)));
        assert!(!f.update(true, MS(199)));
        assert!(f.update(true, MS(200)));
    }

    #[test]
    fn false_sample_clears_confirmed_output() {
        let mut f = DebounceFilter::new(MS(50));
        f.update(true, MS(0));
        assert!(f.update(true, MS(60)));
        assert!(!f.update(false, MS(70)));
        assert!(!f.is_confirmed());
    }

    #[test]
    fn zero_duration_confirms_first_sample() {
        let mut f = DebounceFilter::new(Duration::ZERO);
        assert!(f.update(true, MS(0)));
    }

    #[test]
    fn tolerates_irregular_sample_spacing() {
        let mut f = DebounceFilter::new(MS(100));
        f.update(true, MS(0));
        // One late sample far past the boundary still confirms.
        assert!(f.update(true, MS(500)));
    }
}
