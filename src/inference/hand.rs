use super::preprocess::Preprocessor;
use super::types::{HandSegmenter, InferenceError, SegmentationMask};
use crate::frame::Frame;
use anyhow::Result;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const MODEL: &str = "hand segmentation";

/// Hand segmentation model
///
/// Takes a 224x224 RGB frame and returns a single-channel hand probability
/// map, typically at half the input resolution (112x112). The model is
/// stateless, so frames can be skipped freely between calls.
pub struct HandSegmentationModel {
    session: Session,
    preprocessor: Preprocessor,
    output_size: (u32, u32),
}

impl HandSegmentationModel {
    /// Load the model from an ONNX file
    ///
    /// # Default Configuration
    /// - Input size: 224x224
    /// - Output size: 112x112 until the first inference reports otherwise
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = super::load_session(model_path.as_ref(), MODEL)?;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(224, 224),
            output_size: (112, 112),
        })
    }

    /// Mirror frames before segmentation (for front cameras that deliver
    /// an unmirrored image while the model was trained on selfies)
    pub fn mirrored(mut self, mirror: bool) -> Self {
        self.preprocessor = self.preprocessor.mirrored(mirror);
        self
    }
}

impl HandSegmenter for HandSegmentationModel {
    fn segment(&mut self, frame: &Frame) -> Result<SegmentationMask, InferenceError> {
        let _span = tracing::debug_span!("hand_segment").entered();
        let runtime = |source: ort::Error| InferenceError::Runtime {
            model: MODEL,
            source,
        };

        let input = self.preprocessor.preprocess(frame.image());

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(&input).map_err(runtime)?])
            .map_err(runtime)?;
        drop(_infer_span);

        // Expected shape: [1, 1, H, W] or [1, H, W]
        let output = super::first_output(outputs.values(), MODEL)?;
        let (shape, values) = output.try_extract_tensor::<f32>().map_err(runtime)?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let (height, width) = match dims.as_slice() {
            [lead @ .., h, w] if lead.iter().all(|&d| d == 1) && *h > 0 && *w > 0 => {
                (*h as usize, *w as usize)
            }
            _ => {
                return Err(InferenceError::UnexpectedOutput {
                    model: MODEL,
                    detail: format!("mask shape {:?}", dims),
                })
            }
        };

        let mask = Preprocessor::probabilities_to_mask(values, width, height).ok_or_else(|| {
            InferenceError::UnexpectedOutput {
                model: MODEL,
                detail: format!("{} samples for a {}x{} mask", values.len(), width, height),
            }
        })?;

        self.output_size = (width as u32, height as u32);
        Ok(mask)
    }

    fn input_size(&self) -> (u32, u32) {
        self.preprocessor.target_size()
    }

    fn output_size(&self) -> (u32, u32) {
        self.output_size
    }
}
