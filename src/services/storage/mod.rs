//! Storage backends and the sink contract they implement.

pub mod disk;
pub mod memory;
pub mod s3;

pub use disk::{DiskStorage, DiskStorageOptions};
pub use memory::{MemoryStorage, MemoryStorageOptions};
pub use s3::{
    AwsS3Repository, BodyMode, ClientProvider, GetObjectRequest, ObjectBody, PutObjectRequest,
    S3Object, S3Repository, S3Sign, S3Storage, S3StorageOptions, SignedField, UploadParams,
};

use crate::api::error::UploadError;
use crate::models::UploadFile;
use crate::services::context::RequestContext;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Persists one field's batch of extracted files.
///
/// Invoked once per field with every file extracted for it, in submission
/// order. Errors are returned to the client unchanged.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn store(&self, ctx: &RequestContext, files: &[UploadFile]) -> Result<(), UploadError>;
}

type SyncResolveFn = dyn Fn(&RequestContext, &UploadFile) -> String + Send + Sync;
type AsyncResolveFn =
    dyn for<'a> Fn(&'a RequestContext, &'a UploadFile) -> BoxFuture<'a, String> + Send + Sync;

/// A configuration value that is either fixed or computed per file.
#[derive(Clone)]
pub enum Resolver {
    Fixed(String),
    Computed(Arc<SyncResolveFn>),
    Deferred(Arc<AsyncResolveFn>),
}

impl Resolver {
    pub fn fixed(value: impl Into<String>) -> Self {
        Resolver::Fixed(value.into())
    }

    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, &UploadFile) -> String + Send + Sync + 'static,
    {
        Resolver::Computed(Arc::new(f))
    }

    /// Computes the value asynchronously, e.g.
    /// `Resolver::with_async(|ctx, file| Box::pin(async move { ... }))`.
    pub fn with_async<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a RequestContext, &'a UploadFile) -> BoxFuture<'a, String>
            + Send
            + Sync
            + 'static,
    {
        Resolver::Deferred(Arc::new(f))
    }

    /// Resolves to the upload's declared file name.
    pub fn file_name() -> Self {
        Self::with(|_, file| file.name().to_string())
    }

    pub async fn resolve(&self, ctx: &RequestContext, file: &UploadFile) -> String {
        match self {
            Resolver::Fixed(value) => value.clone(),
            Resolver::Computed(f) => f(ctx, file),
            Resolver::Deferred(f) => f(ctx, file).await,
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolver::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Resolver::Computed(_) => f.write_str("Computed(..)"),
            Resolver::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for Resolver {
    fn from(value: &str) -> Self {
        Resolver::fixed(value)
    }
}

impl From<String> for Resolver {
    fn from(value: String) -> Self {
        Resolver::Fixed(value)
    }
}
