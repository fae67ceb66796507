use shared::{MISSING_ANNOTATION_WARNING, SegmentationResponse, join_labels};
use std::path::{Path, PathBuf};

use crate::inference::{InferenceError, Prediction, SaveOptions};
use crate::storage::upload_service::SavedUpload;

pub const UPLOADS_URL: &str = "/predicts/uploaded_images";
pub const OUTPUT_URL: &str = "/predicts/output";

/// The annotated image a run is expected to leave behind for `uploaded_path`.
pub fn annotated_path(output_dir: &Path, uploaded_path: &Path) -> PathBuf {
    match uploaded_path.file_name() {
        Some(file_name) => output_dir.join(file_name),
        None => output_dir.to_path_buf(),
    }
}

/// Turns a saved upload and its prediction into what the page renders.
#[derive(Clone)]
pub struct ResultPresenter {
    save: SaveOptions,
}

impl ResultPresenter {
    pub fn new(save: SaveOptions) -> Self {
        Self { save }
    }

    pub fn save_options(&self) -> &SaveOptions {
        &self.save
    }

    pub fn present(
        &self,
        upload: &SavedUpload,
        prediction: &Prediction,
    ) -> Result<SegmentationResponse, InferenceError> {
        let labels = prediction.labels()?;
        let summary = join_labels(&labels);

        let annotated = annotated_path(&self.save.output_dir(), &upload.path);
        let (annotated_url, warning) = if annotated.is_file() {
            (Some(format!("{}/{}", OUTPUT_URL, upload.file_name)), None)
        } else {
            log::warn!("Annotated image not found at {}", annotated.display());
            (None, Some(MISSING_ANNOTATION_WARNING.to_string()))
        };

        Ok(SegmentationResponse {
            upload_id: upload.id.to_string(),
            file_name: upload.file_name.clone(),
            original_url: format!("{}/{}", UPLOADS_URL, upload.file_name),
            annotated_url,
            warning,
            labels,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ClassNames, SegmentationModel};
    use crate::mocks::MockSegmentationModel;
    use uuid::Uuid;

    fn upload(dir: &Path) -> SavedUpload {
        let id = Uuid::new_v4();
        let file_name = format!("{}.jpg", id);
        SavedUpload {
            id,
            path: dir.join("uploaded_images").join(&file_name),
            file_name,
            had_alpha: false,
        }
    }

    #[test]
    fn annotated_path_mirrors_the_upload_name() {
        assert_eq!(
            annotated_path(Path::new("predicts/output"), Path::new("predicts/uploaded_images/a.png")),
            Path::new("predicts/output/a.png")
        );
    }

    #[test]
    fn existing_annotation_is_linked() {
        let temp = tempfile::tempdir().unwrap();
        let presenter = ResultPresenter::new(SaveOptions::new(temp.path(), "output"));
        let upload = upload(temp.path());
        std::fs::create_dir_all(temp.path().join("output")).unwrap();
        std::fs::write(temp.path().join("output").join(&upload.file_name), b"x").unwrap();

        let names = ClassNames::from_labels(["plastic", "metal"]);
        let response = presenter
            .present(&upload, &Prediction::new(names, vec![1, 0, 1]))
            .unwrap();

        assert_eq!(
            response.annotated_url,
            Some(format!("/predicts/output/{}", upload.file_name))
        );
        assert_eq!(
            response.original_url,
            format!("/predicts/uploaded_images/{}", upload.file_name)
        );
        assert_eq!(response.warning, None);
        assert_eq!(response.labels, vec!["metal", "plastic"]);
        assert_eq!(response.summary, "metal, plastic");
        assert_eq!(response.upload_id, upload.id.to_string());
    }

    #[test]
    fn missing_annotation_is_a_warning() {
        let temp = tempfile::tempdir().unwrap();
        let presenter = ResultPresenter::new(SaveOptions::new(temp.path(), "output"));
        let upload = upload(temp.path());

        let names = ClassNames::from_labels(["plastic"]);
        let response = presenter
            .present(&upload, &Prediction::new(names, vec![0]))
            .unwrap();

        assert_eq!(response.annotated_url, None);
        assert_eq!(response.warning.as_deref(), Some(MISSING_ANNOTATION_WARNING));
        assert_eq!(response.summary, "plastic");
    }

    #[test]
    fn nothing_detected_gives_an_empty_summary() {
        let temp = tempfile::tempdir().unwrap();
        let presenter = ResultPresenter::new(SaveOptions::new(temp.path(), "output"));
        let response = presenter
            .present(&upload(temp.path()), &Prediction::new(ClassNames::default(), vec![]))
            .unwrap();
        assert!(response.labels.is_empty());
        assert_eq!(response.summary, "");
    }

    #[test]
    fn annotation_written_by_the_model_is_found_beside_earlier_runs() {
        let temp = tempfile::tempdir().unwrap();
        let presenter = ResultPresenter::new(SaveOptions::new(temp.path(), "output"));
        std::fs::create_dir_all(temp.path().join("output")).unwrap();
        std::fs::create_dir_all(temp.path().join("output2")).unwrap();

        let upload = upload(temp.path());
        std::fs::create_dir_all(upload.path.parent().unwrap()).unwrap();
        image::RgbImage::new(8, 8).save(&upload.path).unwrap();

        let model = MockSegmentationModel::new(ClassNames::from_labels(["glass"]), vec![0]);
        let prediction = model.predict(&upload.path, presenter.save_options()).unwrap();
        let response = presenter.present(&upload, &prediction).unwrap();

        assert!(temp.path().join("output").join(&upload.file_name).is_file());
        assert!(!temp.path().join("output2").join(&upload.file_name).exists());
        assert_eq!(
            response.annotated_url,
            Some(format!("/predicts/output/{}", upload.file_name))
        );
        assert_eq!(response.warning, None);
    }
}
