mod feature_print;
mod hand;
mod preprocess;
pub mod types;

pub use feature_print::FeaturePrintModel;
pub use hand::HandSegmentationModel;
pub use preprocess::Preprocessor;
pub use types::{Embedder, Fingerprint, HandSegmenter, InferenceError, SegmentationMask};

use anyhow::{Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;

/// Build an ONNX Runtime session for one of the models
fn load_session(path: &Path, label: &str) -> Result<Session> {
    tracing::info!("Loading {} model from {}", label, path.display());

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load {} model from {}", label, path.display()))?;

    tracing::info!("{} model loaded successfully", label);
    Ok(session)
}


/// First value a model produced; a model with no outputs is malformed.
fn first_output<T>(
    mut outputs: impl Iterator<Item = T>,
    model: &'static str,
) -> std::result::Result<T, InferenceError> {
    outputs.next().ok_or_else(|| InferenceError::UnexpectedOutput {
        model,
        detail: "model produced no outputs".to_string(),
    })
}
