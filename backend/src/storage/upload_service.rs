use image::{DynamicImage, ImageFormat};
use shared::UploadExtension;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Clone)]
pub struct UploadService {
    upload_dir: PathBuf,
    max_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("Uploaded file is empty")]
    Empty,
    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: usize, limit: usize },
    #[error("Failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("Failed to write image: {0}")]
    Encode(image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An upload persisted under its generated name.
#[derive(Debug, Clone)]
pub struct SavedUpload {
    pub id: Uuid,
    pub file_name: String,
    pub path: PathBuf,
    pub had_alpha: bool,
}

impl UploadService {
    pub fn new(upload_dir: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_size,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn extract_file_extension(file_name: &str) -> Result<(UploadExtension, &str), UploadError> {
        UploadExtension::from_file_name(file_name)
            .ok_or_else(|| UploadError::UnsupportedExtension(file_name.to_string()))
    }

    pub fn generate_file_name(id: Uuid, file_extension: &str) -> String {
        format!("{}.{}", id, file_extension)
    }

    pub fn validate_image_size(&self, image_data: &[u8]) -> Result<(), UploadError> {
        if image_data.is_empty() {
            return Err(UploadError::Empty);
        }
        if image_data.len() > self.max_size {
            return Err(UploadError::FileTooLarge {
                size: image_data.len(),
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Decodes the upload, drops any alpha channel and writes it as `<uuid>.<ext>`.
    pub fn save_image(&self, file_name: &str, image_data: &[u8]) -> Result<SavedUpload, UploadError> {
        let (kind, file_extension) = Self::extract_file_extension(file_name)?;
        self.validate_image_size(image_data)?;

        let image = image::load_from_memory(image_data).map_err(UploadError::Decode)?;
        let had_alpha = image.color().has_alpha();
        let mut image = strip_alpha(image);

        let format = if kind.is_jpeg() {
            image = jpeg_compatible(image);
            ImageFormat::Jpeg
        } else {
            image = png_compatible(image);
            ImageFormat::Png
        };

        fs::create_dir_all(&self.upload_dir)?;

        let id = Uuid::new_v4();
        let stored_name = Self::generate_file_name(id, file_extension);
        let path = self.upload_dir.join(&stored_name);

        if let Err(e) = image.save_with_format(&path, format) {
            // don't leave a truncated file where the static route serves it
            let _ = fs::remove_file(&path);
            return Err(UploadError::Encode(e));
        }

        log::info!(
            "Saved upload {} as {} ({}x{}, alpha dropped: {})",
            file_name,
            path.display(),
            image.width(),
            image.height(),
            had_alpha
        );

        Ok(SavedUpload {
            id,
            file_name: stored_name,
            path,
            had_alpha,
        })
    }
}

pub fn strip_alpha(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgba8(_) => DynamicImage::ImageRgb8(image.to_rgb8()),
        DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLuma8(image.to_luma8()),
        DynamicImage::ImageRgba16(_) => DynamicImage::ImageRgb16(image.to_rgb16()),
        DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma16(image.to_luma16()),
        DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgb32F(image.to_rgb32f()),
        other => other,
    }
}

// The JPEG encoder only takes 8-bit luma or RGB.
fn jpeg_compatible(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

// PNG has no float samples; keep the extra depth as 16 bits.
fn png_compatible(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgb16(image.to_rgb16())
        }
        other => other,
    }
}
