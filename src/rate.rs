/// Which of the two configured sampling rates is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLevel {
    #[default]
    Slow,
    Fast,
}

/// Two-level sampling rate driven by movement classifications.
///
/// Only the level is stored; the target frequency is always read from the
/// configured value for that level.
#[derive(Debug, Clone)]
pub struct RateController {
    level: RateLevel,
    slow_hz: f64,
    fast_hz: f64,
}

impl RateController {
    pub fn new(slow_hz: f64, fast_hz: f64) -> Self {
        Self {
            level: RateLevel::Slow,
            slow_hz,
            fast_hz,
        }
    }

    pub fn level(&self) -> RateLevel {
        self.level
    }

    pub fn target_hz(&self) -> f64 {
        match self.level {
            RateLevel::Slow => self.slow_hz,
            RateLevel::Fast => self.fast_hz,
        }
    }

    /// Movement detected. Returns true if this switched Slow to Fast.
    pub fn speed_up(&mut self) -> bool {
        self.switch_to(RateLevel::Fast)
    }

    /// Still frame after the cooldown. Returns true if this switched Fast to Slow.
    pub fn slow_down(&mut self) -> bool {
        self.switch_to(RateLevel::Slow)
    }

    pub fn set_rates(&mut self, slow_hz: f64, fast_hz: f64) {
        self.slow_hz = slow_hz;
        self.fast_hz = fast_hz;
    }

    fn switch_to(&mut self, level: RateLevel) -> bool {
        let changed = self.level != level;
        if changed {
            tracing::debug!(
                "Sampling rate {:?} -> {:?} ({} Hz)",
                self.level,
                level,
                match level {
                    RateLevel::Slow => self.slow_hz,
                    RateLevel::Fast => self.fast_hz,
                }
            );
        }
        self.level = level;
        changed
    }
}
