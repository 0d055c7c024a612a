use std::time::{Duration, Instant};

/// Time source shared by every timestamp the pipeline records.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Monotonic wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Minimum spacing between two processed frames at `target_hz`.
pub fn frame_interval(target_hz: f64) -> Duration {
    Duration::from_secs_f64(1.0 / target_hz)
}

/// Admission check run before any analysis.
///
/// A frame is accepted once at least `1 / target_hz` has passed since the
/// last processed frame (boundary inclusive). A `now` earlier than
/// `last_frame_at` counts as zero elapsed time. `target_hz` must be positive.
pub fn should_process(now: Instant, last_frame_at: Instant, target_hz: f64) -> bool {
    now.saturating_duration_since(last_frame_at) >= frame_interval(target_hz)
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::Clock;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    /// Clock that only moves when told to. Clones share the same time.
    #[derive(Debug, Clone)]
    pub(crate) struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl ManualClock {
        pub(crate) fn new(start: Instant) -> Self {
            Self {
                now: Rc::new(Cell::new(start)),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }

        pub(crate) fn set(&self, at: Instant) {
            self.now.set(at);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejects_inside_interval() {
        let start = Instant::now();
        let now = start + Duration::from_millis(199);
        assert!(!should_process(now, start, 5.0));
    }

    #[test]
    fn gate_accepts_at_boundary_and_above() {
        let start = Instant::now();
        assert!(should_process(start + Duration::from_millis(200), start, 5.0));
        assert!(should_process(start + Duration::from_millis(350), start, 5.0));
    }

    #[test]
    fn gate_is_monotonic_across_rates() {
        let start = Instant::now();
        for hz in [1.0, 2.5, 5.0, 15.0, 30.0, 60.0] {
            let interval = frame_interval(hz);
            assert!(!should_process(start + interval / 2, start, hz), "hz={hz}");
            assert!(should_process(start + interval, start, hz), "hz={hz}");
            assert!(should_process(start + interval * 3, start, hz), "hz={hz}");
        }
    }

    #[test]
    fn clock_skew_counts_as_zero_elapsed() {
        let later = Instant::now() + Duration::from_secs(5);
        let earlier = later - Duration::from_secs(2);
        assert!(!should_process(earlier, later, 5.0));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let start = Instant::now();
        let clock = ManualClock::new(start);
        let other = clock.clone();
        clock.advance(Duration::from_millis(10));
        assert_eq!(other.now(), start + Duration::from_millis(10));
        other.set(start);
        assert_eq!(clock.now(), start);
    }
}
