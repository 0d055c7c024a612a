use super::{PreviewMode, PreviewSink};
use crate::frame::{Frame, Orientation};
use crate::inference::SegmentationMask;
use anyhow::{Context, Result};
use image::{imageops, GrayImage, Luma, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// Preview written to a v4l2loopback device, viewable in any camera app.
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
    mode: PreviewMode,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(
        device_path: P,
        width: u32,
        height: u32,
        mode: PreviewMode,
    ) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{}, {:?})",
            path.display(),
            width,
            height,
            mode
        );

        // Announce the frame format so readers see YUYV at our resolution
        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2 device at {}", path.display()))?;
        Output::set_format(&device, &Format::new(width, height, FourCC::new(b"YUYV")))
            .context("Failed to set v4l2loopback output format")?;

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            width,
            height,
            mode,
        })
    }

    /// Convert RGB frame to YUV422 (YUYV) format
    fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
        let (width, height) = rgb_image.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let pixel1 = rgb_image.get_pixel(x, y);
                let pixel2 = if x + 1 < width {
                    rgb_image.get_pixel(x + 1, y)
                } else {
                    pixel1
                };

                let (y1, u1, v1) = rgb_to_yuv(pixel1[0], pixel1[1], pixel1[2]);
                let (y2, u2, v2) = rgb_to_yuv(pixel2[0], pixel2[1], pixel2[2]);

                // Average U and V for the pair of pixels
                let u = ((u1 as u16 + u2 as u16) / 2) as u8;
                let v = ((v1 as u16 + v2 as u16) / 2) as u8;

                // YUYV format: Y0 U Y1 V
                yuyv.extend_from_slice(&[y1, u, y2, v]);
            }
        }

        yuyv
    }

    /// Grayscale needs no colour conversion: luma is the sample, chroma is neutral
    fn gray_to_yuyv(gray: &GrayImage) -> Vec<u8> {
        let (width, height) = gray.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let y1 = gray.get_pixel(x, y)[0];
                let y2 = if x + 1 < width {
                    gray.get_pixel(x + 1, y)[0]
                } else {
                    y1
                };
                yuyv.extend_from_slice(&[y1, 128, y2, 128]);
            }
        }

        yuyv
    }

    fn mask_to_gray(mask: &SegmentationMask) -> GrayImage {
        GrayImage::from_fn(mask.width(), mask.height(), |x, y| Luma([mask.get(x, y)]))
    }

    fn write(&mut self, yuyv: &[u8]) -> Result<()> {
        self.file
            .write_all(yuyv)
            .context("Failed to write preview to v4l2loopback device")
    }
}

/// Convert RGB to YUV color space
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl PreviewSink for V4L2Output {
    fn show_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.mode != PreviewMode::Frame {
            return Ok(());
        }

        let mut image = if frame.dimensions() != (self.width, self.height) {
            imageops::resize(
                frame.image(),
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            )
        } else {
            frame.image().clone()
        };
        // Show the user a mirror image, as a selfie camera would
        if frame.orientation() == Orientation::Mirrored {
            imageops::flip_horizontal_in_place(&mut image);
        }

        let yuyv = Self::rgb_to_yuyv(&image);
        self.write(&yuyv)
    }

    fn show_mask(&mut self, mask: &SegmentationMask) -> Result<()> {
        if self.mode != PreviewMode::Mask {
            return Ok(());
        }

        let gray = Self::mask_to_gray(mask);
        let scaled = imageops::resize(
            &gray,
            self.width,
            self.height,
            imageops::FilterType::Nearest,
        );
        let yuyv = Self::gray_to_yuyv(&scaled);
        self.write(&yuyv)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
