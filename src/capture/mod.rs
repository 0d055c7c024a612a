mod v4l_capture;

pub use v4l_capture::WebcamCapture;

use crate::frame::Frame;
use anyhow::Result;

/// Trait for camera capture sources
///
/// Frames arrive at the source's native cadence; the pipeline's rate gate
/// decides which of them get analysed.
pub trait FrameSource {
    /// Block until the next frame is available
    fn next_frame(&mut self) -> Result<Frame>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}
