use image::RgbImage;
use std::time::Instant;

/// How the camera sensor is oriented relative to the person in front of it.
///
/// Mask scans run bottom-to-top in the frame's own coordinate system, so the
/// orientation only matters to sinks that display the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Upright,
    Mirrored,
}

/// A single captured image plus the instant it was decoded.
///
/// Frames are borrowed by the pipeline for one cycle and never retained.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: Instant,
    orientation: Orientation,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: Instant) -> Self {
        Self {
            image,
            captured_at,
            orientation: Orientation::Upright,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Returns (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
