use crate::frame::Frame;
use ndarray::{Array1, Array2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{model} model failed to run")]
    Runtime {
        model: &'static str,
        #[source]
        source: ort::Error,
    },

    #[error("{model} model produced unexpected output: {detail}")]
    UnexpectedOutput { model: &'static str, detail: String },
}

impl InferenceError {
    pub fn model(&self) -> &'static str {
        match self {
            Self::Runtime { model, .. } | Self::UnexpectedOutput { model, .. } => model,
        }
    }
}

/// Fixed-size embedding of a frame, used only for similarity comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint(Array1<f32>);

impl Fingerprint {
    pub fn new(values: Array1<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &Array1<f32> {
        &self.0
    }

    /// L2 distance, or `None` when the two embeddings differ in length.
    pub fn euclidean_distance(&self, other: &Fingerprint) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        let sum: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }
}

/// Single-channel hand probability mask, values 0-255.
///
/// Stored as `[row, column]` with row 0 at the top of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    data: Array2<u8>,
}

impl SegmentationMask {
    pub fn new(data: Array2<u8>) -> Self {
        Self { data }
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self::new(Array2::zeros((height as usize, width as usize)))
    }

    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[[y as usize, x as usize]]
    }

    pub fn data(&self) -> &Array2<u8> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<u8> {
        &mut self.data
    }
}

/// Reduces frames to fingerprints and compares them.
pub trait Embedder {
    fn embed(&mut self, frame: &Frame) -> Result<Fingerprint, InferenceError>;

    /// Distance between two fingerprints; larger means less similar.
    fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<f32, InferenceError>;
}

/// Trait for hand segmentation models
pub trait HandSegmenter {
    /// Map a frame to a hand mask at the model's output resolution
    fn segment(&mut self, frame: &Frame) -> Result<SegmentationMask, InferenceError>;

    /// Returns (width, height) of the model input
    fn input_size(&self) -> (u32, u32);

    /// Returns (width, height) of the produced mask
    fn output_size(&self) -> (u32, u32) {
        self.input_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn euclidean_distance_of_known_vectors() {
        let a = Fingerprint::new(array![0.0, 0.0, 0.0]);
        let b = Fingerprint::new(array![3.0, 4.0, 0.0]);
        assert_eq!(a.euclidean_distance(&b), Some(5.0));
        assert_eq!(b.euclidean_distance(&b), Some(0.0));
    }

    #[test]
    fn mismatched_fingerprints_have_no_distance() {
        let a = Fingerprint::new(array![1.0, 2.0]);
        let b = Fingerprint::new(array![1.0, 2.0, 3.0]);
        assert_eq!(a.euclidean_distance(&b), None);
    }

    struct SquareSegmenter;

    impl HandSegmenter for SquareSegmenter {
        fn segment(&mut self, _frame: &Frame) -> Result<SegmentationMask, InferenceError> {
            Ok(SegmentationMask::zeros(64, 64))
        }

        fn input_size(&self) -> (u32, u32) {
            (64, 64)
        }
    }

    #[test]
    fn mask_size_defaults_to_input_size() {
        assert_eq!(SquareSegmenter.output_size(), (64, 64));
    }

    #[test]
    fn mask_dimensions_follow_row_major_layout() {
        let mut mask = SegmentationMask::zeros(4, 2);
        mask.data_mut()[[1, 3]] = 200;
        assert_eq!(mask.width(), 4);
        assert_eq!(mask.height(), 2);
        assert_eq!(mask.get(3, 1), 200);
    }
}
