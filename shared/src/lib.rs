use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// File extensions accepted by the upload control and the segmentation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UploadExtension {
    Jpg,
    Jpeg,
    Png,
}

impl UploadExtension {
    /// Splits the extension off a client file name, keeping its original spelling.
    pub fn from_file_name(file_name: &str) -> Option<(Self, &str)> {
        let (_, ext) = file_name.rsplit_once('.')?;
        ext.parse::<Self>().ok().map(|parsed| (parsed, ext))
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self, UploadExtension::Jpg | UploadExtension::Jpeg)
    }

    /// Value for the `accept` attribute of a file input.
    pub fn accept_attribute() -> String {
        Self::iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Shown in place of the segmented output when the model left no annotated image.
pub const MISSING_ANNOTATION_WARNING: &str = "Annotated image not found.";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SegmentationResponse {
    pub upload_id: String,
    pub file_name: String,
    pub original_url: String,
    pub annotated_url: Option<String>,
    pub warning: Option<String>,
    pub labels: Vec<String>,
    pub summary: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

pub fn join_labels<S: AsRef<str>>(labels: &[S]) -> String {
    labels
        .iter()
        .map(|label| label.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_parsing_is_case_insensitive_and_keeps_spelling() {
        assert_eq!(
            UploadExtension::from_file_name("Photo.JPG"),
            Some((UploadExtension::Jpg, "JPG"))
        );
        assert_eq!(
            UploadExtension::from_file_name("archive.tar.png"),
            Some((UploadExtension::Png, "png"))
        );
        assert_eq!(UploadExtension::from_file_name("anim.gif"), None);
        assert_eq!(UploadExtension::from_file_name("no_extension"), None);
    }

    #[test]
    fn accept_attribute_lists_every_extension() {
        assert_eq!(UploadExtension::accept_attribute(), ".jpg,.jpeg,.png");
    }

    #[test]
    fn labels_are_comma_joined() {
        assert_eq!(join_labels(&["plastic", "metal"]), "plastic, metal");
        assert_eq!(join_labels::<&str>(&[]), "");
    }

    #[test]
    fn missing_annotation_warning_text() {
        assert_eq!(MISSING_ANNOTATION_WARNING, "Annotated image not found.");
    }

    #[test]
    fn response_serializes_missing_annotation_as_null() {
        let response = SegmentationResponse {
            upload_id: "id".into(),
            file_name: "id.png".into(),
            original_url: "/predicts/uploaded_images/id.png".into(),
            annotated_url: None,
            warning: Some(MISSING_ANNOTATION_WARNING.into()),
            labels: vec![],
            summary: String::new(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["annotated_url"].is_null());
        assert_eq!(value["summary"], "");
    }
}
