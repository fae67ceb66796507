pub mod annotate;
pub mod class_names;
#[cfg(feature = "torch")]
pub mod torch_model;
pub mod yolo_cli;
pub mod yolo_decode;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ModelBackend, ModelConfig};

pub use class_names::ClassNames;
pub use yolo_cli::YoloCliModel;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to load class names from {path:?}: {reason}")]
    ClassNames { path: PathBuf, reason: String },
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Model process exited with {status}: {stderr}")]
    Process { status: String, stderr: String },
    #[error("Failed to read detections from {path:?}: {reason}")]
    Detections { path: PathBuf, reason: String },
    #[error("Class index {0} is missing from the class names table")]
    UnknownClass(usize),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model backend '{0}' is not compiled into this build")]
    BackendUnavailable(String),
}

#[cfg(feature = "torch")]
impl From<tch::TchError> for InferenceError {
    fn from(err: tch::TchError) -> Self {
        InferenceError::Model(err.to_string())
    }
}

/// Where a model run writes its visual output: `<project>/<name>`.
///
/// The run directory is always reused, so every annotated image lands next to
/// the others and the presenter finds it under the upload's file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub project: PathBuf,
    pub name: String,
}

impl SaveOptions {
    pub fn new(project: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.project.join(&self.name)
    }
}

/// What one model call reports: the label table and one class index per instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub names: ClassNames,
    pub classes: Vec<usize>,
}

impl Prediction {
    pub fn new(names: ClassNames, classes: Vec<usize>) -> Self {
        Self { names, classes }
    }

    pub fn instance_count(&self) -> usize {
        self.classes.len()
    }

    /// Distinct labels of all detected instances, in order of first detection.
    pub fn labels(&self) -> Result<Vec<String>, InferenceError> {
        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for &class in &self.classes {
            let label = self
                .names
                .get(class)
                .ok_or(InferenceError::UnknownClass(class))?;
            if seen.insert(label) {
                labels.push(label.to_string());
            }
        }
        Ok(labels)
    }
}

/// A pretrained segmentation model that annotates an image file on disk.
pub trait SegmentationModel: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the model on `image_path`, saving the annotated image as
    /// `<output dir>/<file name of image_path>`.
    fn predict(&self, image_path: &Path, save: &SaveOptions) -> Result<Prediction, InferenceError>;
}

pub fn load_model(config: &ModelConfig) -> Result<Arc<dyn SegmentationModel>, InferenceError> {
    let names = ClassNames::load(&config.class_names_path)?;
    match config.backend {
        ModelBackend::YoloCli => {
            let model = YoloCliModel::new(config, names);
            log::info!(
                "Using Ultralytics CLI backend ({}) with weights {}",
                model.program(),
                config.model_path.display()
            );
            Ok(Arc::new(model))
        }
        ModelBackend::Torch => load_torch_model(config, names),
    }
}

#[cfg(feature = "torch")]
fn load_torch_model(
    config: &ModelConfig,
    names: ClassNames,
) -> Result<Arc<dyn SegmentationModel>, InferenceError> {
    let model = torch_model::TorchModel::new(config, names)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "torch"))]
fn load_torch_model(
    _config: &ModelConfig,
    _names: ClassNames,
) -> Result<Arc<dyn SegmentationModel>, InferenceError> {
    Err(InferenceError::BackendUnavailable("torch".to_string()))
}
