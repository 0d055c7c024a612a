use super::types::SegmentationMask;
use image::{imageops, RgbImage};
use ndarray::{Array2, Array4};

/// Preprocessor for converting RGB frames to model input tensors
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    mirror: bool,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            mirror: false,
        }
    }

    /// Flip frames horizontally before they reach the model
    pub fn mirrored(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Returns (width, height)
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Optionally mirror horizontally
    /// 3. Convert to float, normalize to [0, 1] and lay out as NCHW
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let mut resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };
        if self.mirror {
            imageops::flip_horizontal_in_place(&mut resized);
        }

        let (width, height) = resized.dimensions();
        Array4::from_shape_fn(
            (1, 3, height as usize, width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        )
    }

    /// Convert model probabilities (0.0-1.0, row-major) into a 0-255 mask
    ///
    /// Returns `None` if `values` does not hold exactly `width * height` samples.
    pub fn probabilities_to_mask(
        values: &[f32],
        width: usize,
        height: usize,
    ) -> Option<SegmentationMask> {
        let _span = tracing::debug_span!("postprocess").entered();

        let bytes: Vec<u8> = values
            .iter()
            .map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        Array2::from_shape_vec((height, width), bytes)
            .ok()
            .map(SegmentationMask::new)
    }
}
