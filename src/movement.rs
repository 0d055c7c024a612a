use crate::frame::Frame;
use crate::inference::{Embedder, Fingerprint, InferenceError};
use std::time::{Duration, Instant};

/// Timestamps and reference fingerprint carried between cycles.
#[derive(Debug, Clone)]
pub struct MovementState {
    /// When the last accepted cycle finished
    pub last_frame_at: Instant,
    /// End of the current movement cooldown; in the past when none is running
    pub last_movement_at: Instant,
    /// Reference for the next comparison
    pub fingerprint: Option<Fingerprint>,
}

impl MovementState {
    pub fn new(now: Instant) -> Self {
        Self {
            last_frame_at: now,
            last_movement_at: now,
            fingerprint: None,
        }
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        now < self.last_movement_at
    }

    /// Open the post-movement dead time and drop the reference so the next
    /// comparison starts from a fresh baseline.
    pub fn start_cooldown(&mut self, now: Instant, cooldown: Duration) {
        self.last_movement_at = now + cooldown;
        self.fingerprint = None;
    }
}

#[derive(Debug, Clone)]
pub struct MovementEvaluation {
    pub fingerprint: Fingerprint,
    pub moved: bool,
    /// `None` when there was no prior fingerprint to compare against
    pub distance: Option<f32>,
}

/// Classifies a frame as moving or still relative to the previous one.
#[derive(Debug, Clone)]
pub struct MovementDetector {
    threshold: f32,
}

impl MovementDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn evaluate<E>(
        &self,
        embedder: &mut E,
        frame: &Frame,
        prior: Option<&Fingerprint>,
    ) -> Result<MovementEvaluation, InferenceError>
    where
        E: Embedder + ?Sized,
    {
        let fingerprint = embedder.embed(frame)?;

        let Some(prior) = prior else {
            return Ok(MovementEvaluation {
                fingerprint,
                moved: false,
                distance: None,
            });
        };

        let distance = embedder.distance(&fingerprint, prior)?;
        Ok(MovementEvaluation {
            moved: distance >= self.threshold,
            fingerprint,
            distance: Some(distance),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use ndarray::array;

    /// Embeds every frame as the next value of a script; distance is the
    /// absolute difference.
    struct Scripted {
        values: Vec<f32>,
        calls: usize,
    }

    impl Embedder for Scripted {
        fn embed(&mut self, _frame: &Frame) -> Result<Fingerprint, InferenceError> {
            let value = self.values[self.calls];
            self.calls += 1;
            Ok(Fingerprint::new(array![value]))
        }

        fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<f32, InferenceError> {
            Ok((a.values()[0] - b.values()[0]).abs())
        }
    }

    struct Broken;

    impl Embedder for Broken {
        fn embed(&mut self, _frame: &Frame) -> Result<Fingerprint, InferenceError> {
            Err(InferenceError::UnexpectedOutput {
                model: "test",
                detail: "offline".into(),
            })
        }

        fn distance(&self, _a: &Fingerprint, _b: &Fingerprint) -> Result<f32, InferenceError> {
            unreachable!()
        }
    }

    fn frame() -> Frame {
        Frame::new(RgbImage::new(4, 4), Instant::now())
    }

    #[test]
    fn first_frame_has_nothing_to_compare() {
        let mut embedder = Scripted {
            values: vec![42.0],
            calls: 0,
        };
        let eval = MovementDetector::new(7.5)
            .evaluate(&mut embedder, &frame(), None)
            .unwrap();
        assert!(!eval.moved);
        assert_eq!(eval.distance, None);
        assert_eq!(eval.fingerprint.values()[0], 42.0);
    }

    #[test]
    fn distance_sequence_against_threshold() {
        // Distances 2.0, 3.0, 9.0 between consecutive fingerprints.
        let mut embedder = Scripted {
            values: vec![0.0, 2.0, 5.0, 14.0],
            calls: 0,
        };
        let detector = MovementDetector::new(7.5);
        let mut prior = None;
        let mut moved = Vec::new();
        for _ in 0..4 {
            let eval = detector
                .evaluate(&mut embedder, &frame(), prior.as_ref())
                .unwrap();
            moved.push(eval.moved);
            prior = Some(eval.fingerprint);
        }
        assert_eq!(moved, vec![false, false, false, true]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut embedder = Scripted {
            values: vec![7.5],
            calls: 0,
        };
        let prior = Fingerprint::new(array![0.0]);
        let eval = MovementDetector::new(7.5)
            .evaluate(&mut embedder, &frame(), Some(&prior))
            .unwrap();
        assert!(eval.moved);
        assert_eq!(eval.distance, Some(7.5));
    }

    #[test]
    fn embed_failure_is_reported() {
        let prior = Fingerprint::new(array![1.0]);
        let result = MovementDetector::new(7.5).evaluate(&mut Broken, &frame(), Some(&prior));
        assert!(result.is_err());
    }

    #[test]
    fn cooldown_clears_reference() {
        let start = Instant::now();
        let mut state = MovementState::new(start);
        state.fingerprint = Some(Fingerprint::new(array![1.0]));
        assert!(!state.in_cooldown(start));

        state.start_cooldown(start, Duration::from_secs(3));
        assert!(state.fingerprint.is_none());
        assert!(state.in_cooldown(start + Duration::from_millis(2999)));
        assert!(!state.in_cooldown(start + Duration::from_secs(3)));
    }
}
