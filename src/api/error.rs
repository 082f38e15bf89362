use axum::{
    Json,
    extract::rejection::BytesRejection,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Too many files")]
    TooManyFiles {
        field: String,
        max_count: usize,
        received: usize,
    },

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Multipart rejection: {0}")]
    MultipartRejection(#[from] MultipartRejection),

    #[error("Body error: {0}")]
    Body(#[from] BytesRejection),

    #[error("Form decode error: {0}")]
    UrlEncoded(#[from] serde_urlencoded::de::Error),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl UploadError {
    pub fn is_too_many_files(&self) -> bool {
        matches!(self, UploadError::TooManyFiles { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
            UploadError::Multipart(e) => e.status(),
            UploadError::MultipartRejection(e) => e.status(),
            UploadError::Body(e) => e.status(),
            UploadError::UrlEncoded(_) => StatusCode::BAD_REQUEST,
            UploadError::InvalidFileName(_) => StatusCode::BAD_REQUEST,
            UploadError::Io(_) | UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            UploadError::Io(e) => {
                tracing::error!("Storage I/O error: {:?}", e);
                "Internal Server Error".to_string()
            }
            UploadError::Storage(e) => {
                tracing::error!("Storage backend error: {:?}", e);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
