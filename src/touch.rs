use crate::frame::Frame;
use crate::inference::{HandSegmenter, InferenceError, SegmentationMask};
use std::time::{Duration, Instant};

/// Row order used when accumulating mask intensity.
///
/// Columns are always visited left to right. The order only changes how
/// early the scan can stop, never the decision itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// Last row first; hands usually enter the frame from below
    #[default]
    BottomUp,
    TopDown,
}

/// True once the running sum of mask samples reaches `threshold`.
pub fn coverage_reached(mask: &SegmentationMask, threshold: u64, order: ScanOrder) -> bool {
    if threshold == 0 {
        return true;
    }

    let data = mask.data();
    let height = data.nrows();
    let mut sum = 0u64;
    for i in 0..height {
        let row = match order {
            ScanOrder::BottomUp => height - 1 - i,
            ScanOrder::TopDown => i,
        };
        for &sample in data.row(row) {
            sum += u64::from(sample);
            if sum >= threshold {
                return true;
            }
        }
    }
    false
}

/// Reduces a hand mask to a touch / no-touch decision.
#[derive(Debug, Clone)]
pub struct TouchDetector {
    /// Mean intensity per mask pixel required to declare a touch
    coverage_threshold: f64,
    order: ScanOrder,
}

impl TouchDetector {
    pub fn new(coverage_threshold: f64) -> Self {
        Self {
            coverage_threshold,
            order: ScanOrder::default(),
        }
    }

    pub fn with_order(mut self, order: ScanOrder) -> Self {
        self.order = order;
        self
    }

    pub fn set_coverage_threshold(&mut self, coverage_threshold: f64) {
        self.coverage_threshold = coverage_threshold;
    }

    /// Cumulative intensity a mask of the given size has to reach
    pub fn sum_threshold(&self, width: u32, height: u32) -> u64 {
        let pixels = u64::from(width) * u64::from(height);
        (pixels as f64 * self.coverage_threshold).round() as u64
    }

    pub fn is_touch(&self, mask: &SegmentationMask) -> bool {
        let threshold = self.sum_threshold(mask.width(), mask.height());
        coverage_reached(mask, threshold, self.order)
    }

    /// Segment `frame` and decide. The mask is handed back for preview.
    pub fn evaluate<S>(
        &self,
        segmenter: &mut S,
        frame: &Frame,
    ) -> Result<(bool, SegmentationMask), InferenceError>
    where
        S: HandSegmenter + ?Sized,
    {
        let mask = segmenter.segment(frame)?;
        Ok((self.is_touch(&mask), mask))
    }
}

/// Touch alert level as seen by the alert sink.
///
/// A rising edge is signalled once; repeated touches only push
/// `suppress_until` forward. The first clear decision silences the alert.
#[derive(Debug, Clone, Default)]
pub struct TouchAlertState {
    active: bool,
    suppress_until: Option<Instant>,
}

impl TouchAlertState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn suppress_until(&self) -> Option<Instant> {
        self.suppress_until
    }

    /// Apply a decision. Returns the level to forward to the alert sink, if any.
    pub fn record(&mut self, touched: bool, now: Instant, cooldown: Duration) -> Option<bool> {
        if touched {
            self.suppress_until = Some(now + cooldown);
            if self.active {
                return None;
            }
            self.active = true;
            return Some(true);
        }

        if !self.active {
            return None;
        }
        self.active = false;
        Some(false)
    }
}
