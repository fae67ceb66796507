use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::inference::annotate::{BoundingBox, Detection, annotate, save_annotated};
use crate::inference::{ClassNames, InferenceError, Prediction, SaveOptions, SegmentationModel};

/// A model stand-in that reports fixed detections.
///
/// Each reported instance gets a box in a horizontal strip of the image, so the
/// annotated output it writes is a real image like the one a model would save.
pub struct MockSegmentationModel {
    names: ClassNames,
    classes: Vec<usize>,
    write_annotation: bool,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockSegmentationModel {
    pub fn new(names: ClassNames, classes: Vec<usize>) -> Self {
        Self {
            names,
            classes,
            write_annotation: true,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reports detections but never writes the annotated image.
    pub fn without_annotation(mut self) -> Self {
        self.write_annotation = false;
        self
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(ClassNames::default(), Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn detections(&self, width: u32, height: u32) -> Vec<Detection> {
        let strip = width as f32 / self.classes.len().max(1) as f32;
        self.classes
            .iter()
            .enumerate()
            .map(|(i, &class)| Detection {
                class,
                score: 0.9,
                bbox: BoundingBox {
                    x1: i as f32 * strip,
                    y1: 0.0,
                    x2: (i + 1) as f32 * strip - 1.0,
                    y2: height as f32 - 1.0,
                },
                mask: None,
            })
            .collect()
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn predict(&self, image_path: &Path, save: &SaveOptions) -> Result<Prediction, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(InferenceError::Model(message.clone()));
        }

        if self.write_annotation {
            let image = image::open(image_path)?.to_rgb8();
            let annotated = annotate(&image, &self.detections(image.width(), image.height()));
            let output_dir = save.output_dir();
            fs::create_dir_all(&output_dir)?;
            if let Some(file_name) = image_path.file_name() {
                save_annotated(&annotated, &output_dir.join(file_name))?;
            }
        }

        Ok(Prediction::new(self.names.clone(), self.classes.clone()))
    }
}
