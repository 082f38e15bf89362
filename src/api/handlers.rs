use crate::models::UploadState;
use axum::{Extension, Json};

/// Echoes what the upload middleware published for this request.
pub async fn upload_handler(Extension(state): Extension<UploadState>) -> Json<UploadState> {
    Json(state)
}
