use super::preprocess::Preprocessor;
use super::types::{Embedder, Fingerprint, InferenceError};
use crate::frame::Frame;
use anyhow::Result;
use ndarray::Array1;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const MODEL: &str = "feature print";

/// Image embedding model used as a scene fingerprint.
///
/// Whatever the network's output layout, the output tensor is flattened
/// into a single vector. Distances are Euclidean, so the movement threshold
/// is on the scale of the model's embedding space.
pub struct FeaturePrintModel {
    session: Session,
    preprocessor: Preprocessor,
}

impl FeaturePrintModel {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = super::load_session(model_path.as_ref(), MODEL)?;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(224, 224),
        })
    }
}

impl Embedder for FeaturePrintModel {
    fn embed(&mut self, frame: &Frame) -> Result<Fingerprint, InferenceError> {
        let _span = tracing::debug_span!("feature_print").entered();
        let runtime = |source: ort::Error| InferenceError::Runtime {
            model: MODEL,
            source,
        };

        let input = self.preprocessor.preprocess(frame.image());
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(&input).map_err(runtime)?])
            .map_err(runtime)?;

        let output = super::first_output(outputs.values(), MODEL)?;
        let (_, values) = output.try_extract_tensor::<f32>().map_err(runtime)?;
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::UnexpectedOutput {
                model: MODEL,
                detail: "empty or non-finite embedding".to_string(),
            });
        }

        Ok(Fingerprint::new(Array1::from(values.to_vec())))
    }

    fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<f32, InferenceError> {
        a.euclidean_distance(b)
            .ok_or_else(|| InferenceError::UnexpectedOutput {
                model: MODEL,
                detail: format!("fingerprint lengths differ ({} vs {})", a.len(), b.len()),
            })
    }
}
