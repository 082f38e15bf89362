pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use api::error::UploadError;
pub use api::middleware::{ParsedForm, upload_middleware};
pub use models::{FieldValue, FileEntry, FormData, FormFile, SignOptions, UploadFile, UploadState};
pub use services::context::RequestContext;
pub use services::extractor::{Extraction, FieldExtractor, FieldSchema};
pub use services::storage::{DiskStorage, MemoryStorage, Resolver, S3Storage, StorageSink};

use crate::infrastructure::storage::StorageBackend;
use axum::{Router, middleware::from_fn_with_state, routing::post};

pub fn create_app(backend: &StorageBackend) -> Router {
    Router::new().route(
        "/upload",
        post(api::handlers::upload_handler).layer(from_fn_with_state(
            backend.upload_extraction(),
            upload_middleware,
        )),
    )
}
