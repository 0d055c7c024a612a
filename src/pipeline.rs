use crate::alert::AlertSink;
use crate::clock::{self, Clock, SystemClock};
use crate::config::{Config, ConfigError};
use crate::frame::Frame;
use crate::inference::{Embedder, HandSegmenter, InferenceError};
use crate::movement::{MovementDetector, MovementState};
use crate::output::PreviewSink;
use crate::rate::{RateController, RateLevel};
use crate::touch::{TouchAlertState, TouchDetector};
use std::time::{Duration, Instant};

/// Everything the decision loop carries from one frame to the next.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub movement: MovementState,
    pub rate: RateController,
    pub touch: TouchAlertState,
}

/// Result of the movement step for one accepted frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementCheck {
    /// Inside the post-movement cooldown; no comparison was made
    Cooldown,
    /// First fingerprint after startup or a reset
    NoBaseline,
    Still { distance: f32 },
    Moved { distance: f32 },
    /// The embedder failed; treated as no movement
    Failed,
}

impl MovementCheck {
    /// Touch analysis runs on moving frames and throughout the cooldown
    pub fn warrants_touch_check(&self) -> bool {
        matches!(self, Self::Moved { .. } | Self::Cooldown)
    }
}

/// Result of the touch step for one accepted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchCheck {
    NotRun,
    Clear,
    Touching,
    /// The segmenter failed; treated as no touch
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// Rejected by the rate gate before any analysis
    Dropped,
    Processed {
        movement: MovementCheck,
        touch: TouchCheck,
    },
}

/// Copy of the pipeline state for display on another thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSnapshot {
    pub level: RateLevel,
    pub target_hz: f64,
    pub touch_active: bool,
    pub touch_suppress_until: Option<Instant>,
    pub last_frame_at: Instant,
    pub movement_cooldown_until: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub accepted: u64,
    pub dropped: u64,
    pub movement_checks: u64,
    pub touch_checks: u64,
    pub inference_failures: u64,
    pub embed_time: Duration,
    pub segment_time: Duration,
}

impl PipelineStats {
    pub fn avg_embed_ms(&self) -> f64 {
        average_ms(self.embed_time, self.movement_checks)
    }

    pub fn avg_segment_ms(&self) -> f64 {
        average_ms(self.segment_time, self.touch_checks)
    }
}

fn average_ms(total: Duration, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total.as_secs_f64() * 1000.0 / count as f64
    }
}

/// Per-frame decision engine: rate gate, movement check, touch check.
///
/// Frames must be fed from a single thread in capture order.
pub struct Pipeline<E, S, A, C = SystemClock> {
    config: Config,
    embedder: E,
    segmenter: S,
    alerts: A,
    clock: C,
    preview: Option<Box<dyn PreviewSink>>,
    movement_detector: MovementDetector,
    touch_detector: TouchDetector,
    state: PipelineState,
    stats: PipelineStats,
}

impl<E, S, A> Pipeline<E, S, A, SystemClock>
where
    E: Embedder,
    S: HandSegmenter,
    A: AlertSink,
{
    pub fn new(config: Config, embedder: E, segmenter: S, alerts: A) -> Result<Self, ConfigError> {
        Self::with_clock(config, embedder, segmenter, alerts, SystemClock)
    }
}

impl<E, S, A, C> Pipeline<E, S, A, C>
where
    E: Embedder,
    S: HandSegmenter,
    A: AlertSink,
    C: Clock,
{
    pub fn with_clock(
        config: Config,
        embedder: E,
        segmenter: S,
        alerts: A,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = clock.now();

        Ok(Self {
            movement_detector: MovementDetector::new(config.movement_threshold),
            touch_detector: TouchDetector::new(config.coverage_threshold),
            state: PipelineState {
                movement: MovementState::new(now),
                rate: RateController::new(config.slow_hz, config.fast_hz),
                touch: TouchAlertState::default(),
            },
            config,
            embedder,
            segmenter,
            alerts,
            clock,
            preview: None,
            stats: PipelineStats::default(),
        })
    }

    pub fn with_preview(mut self, preview: Box<dyn PreviewSink>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            level: self.state.rate.level(),
            target_hz: self.state.rate.target_hz(),
            touch_active: self.state.touch.is_active(),
            touch_suppress_until: self.state.touch.suppress_until(),
            last_frame_at: self.state.movement.last_frame_at,
            movement_cooldown_until: self.state.movement.last_movement_at,
        }
    }

    /// Swap in a new configuration, or keep the current one if it is invalid.
    ///
    /// The rate level and any running cooldowns are kept.
    pub fn reconfigure(&mut self, config: Config) -> Result<(), ConfigError> {
        if let Err(err) = config.validate() {
            tracing::warn!("Rejected configuration update: {}", err);
            return Err(err);
        }

        self.state.rate.set_rates(config.slow_hz, config.fast_hz);
        self.movement_detector.set_threshold(config.movement_threshold);
        self.touch_detector
            .set_coverage_threshold(config.coverage_threshold);
        tracing::info!("Configuration updated: {:?}", config);
        self.config = config;
        Ok(())
    }

    /// Run one frame through the gate and, if admitted, the analysis steps.
    pub fn process(&mut self, frame: &Frame) -> Cycle {
        let now = self.clock.now();
        if !clock::should_process(
            now,
            self.state.movement.last_frame_at,
            self.state.rate.target_hz(),
        ) {
            self.stats.dropped += 1;
            return Cycle::Dropped;
        }
        self.stats.accepted += 1;

        let movement = if self.state.movement.in_cooldown(now) {
            MovementCheck::Cooldown
        } else {
            self.check_movement(frame, now)
        };

        let touch = if movement.warrants_touch_check() {
            self.check_touch(frame, now)
        } else {
            TouchCheck::NotRun
        };

        if let Some(preview) = self.preview.as_mut() {
            if let Err(err) = preview.show_frame(frame) {
                tracing::warn!("Preview failed: {:#}", err);
            }
        }

        tracing::debug!(
            "Frame age {:?}: {:?}, {:?}, {:?}",
            now.saturating_duration_since(frame.captured_at()),
            movement,
            touch,
            self.state.rate.level()
        );

        // Stamped after the work so slow inference stretches the interval
        self.state.movement.last_frame_at = self.clock.now();

        Cycle::Processed { movement, touch }
    }

    fn check_movement(&mut self, frame: &Frame, now: Instant) -> MovementCheck {
        let started = Instant::now();
        let result = self.movement_detector.evaluate(
            &mut self.embedder,
            frame,
            self.state.movement.fingerprint.as_ref(),
        );
        self.stats.movement_checks += 1;
        self.stats.embed_time += started.elapsed();

        let evaluation = match result {
            Ok(evaluation) => evaluation,
            Err(err) => {
                self.report_failure(&err);
                return MovementCheck::Failed;
            }
        };

        if evaluation.moved {
            let distance = evaluation.distance.unwrap_or_default();
            self.state
                .movement
                .start_cooldown(now, self.config.movement_cooldown);
            if self.state.rate.speed_up() {
                self.alerts.on_movement_changed(true);
            }
            return MovementCheck::Moved { distance };
        }

        self.state.movement.fingerprint = Some(evaluation.fingerprint);
        if self.state.rate.slow_down() {
            self.alerts.on_movement_changed(false);
        }
        match evaluation.distance {
            Some(distance) => MovementCheck::Still { distance },
            None => MovementCheck::NoBaseline,
        }
    }

    fn check_touch(&mut self, frame: &Frame, now: Instant) -> TouchCheck {
        let started = Instant::now();
        let result = self.touch_detector.evaluate(&mut self.segmenter, frame);
        self.stats.touch_checks += 1;
        self.stats.segment_time += started.elapsed();

        let (touched, mask) = match result {
            Ok(decision) => decision,
            Err(err) => {
                self.report_failure(&err);
                return TouchCheck::Failed;
            }
        };

        if let Some(preview) = self.preview.as_mut() {
            if let Err(err) = preview.show_mask(&mask) {
                tracing::warn!("Preview failed: {:#}", err);
            }
        }

        if let Some(active) = self
            .state
            .touch
            .record(touched, now, self.config.touch_cooldown)
        {
            self.alerts.on_touch_changed(active);
        }

        if touched {
            TouchCheck::Touching
        } else {
            TouchCheck::Clear
        }
    }

    fn report_failure(&mut self, err: &InferenceError) {
        self.stats.inference_failures += 1;
        tracing::warn!(
            model = err.model(),
            "Inference failed, treating frame as inactive: {}",
            err
        );
    }
}
