use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::InferenceError;
use crate::storage::upload_service::UploadError;

/// Request-level failures of the segmentation endpoint.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("Multipart error: {0}")]
    Multipart(String),
    #[error("No image file in request")]
    MissingFile,
    #[error("Worker pool error: {0}")]
    Blocking(String),
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::Multipart(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Blocking(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upload(UploadError::FileTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upload(UploadError::Io(_) | UploadError::Encode(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Upload(_) | AppError::Multipart(_) | AppError::MissingFile => {
                StatusCode::BAD_REQUEST
            }
            AppError::Inference(_) | AppError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
