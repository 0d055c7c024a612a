mod loopback;

pub use loopback::V4L2Output;

use crate::frame::Frame;
use crate::inference::SegmentationMask;
use anyhow::Result;

/// Which image a preview sink puts on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    #[default]
    Frame,
    Mask,
}

/// Trait for preview destinations
///
/// Purely observational: errors are logged by the caller and never feed
/// back into the pipeline's decisions.
pub trait PreviewSink {
    /// Show an accepted camera frame
    fn show_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Show the hand mask produced for the last analysed frame
    fn show_mask(&mut self, mask: &SegmentationMask) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}
