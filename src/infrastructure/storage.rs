use crate::config::StorageConfig;
use crate::models::SignOptions;
use crate::services::extractor::{Extraction, FieldSchema};
use crate::services::storage::{
    ClientProvider, DiskStorage, DiskStorageOptions, MemoryStorage, Resolver, S3Storage,
    S3StorageOptions, SignedField,
};
use anyhow::bail;
use aws_sdk_s3::config::{Credentials, Region};
use std::time::Duration;
use tracing::info;

/// Maximum number of files accepted under the `files` field of the demo route.
pub const MAX_FILES: usize = 10;

/// The backend selected by `STORAGE_BACKEND`.
#[derive(Clone)]
pub enum StorageBackend {
    Memory(MemoryStorage),
    Disk(DiskStorage),
    S3 {
        storage: S3Storage,
        sign: SignOptions,
    },
}

impl StorageBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Memory(_) => "memory",
            StorageBackend::Disk(_) => "disk",
            StorageBackend::S3 { .. } => "s3",
        }
    }

    /// `file` as a single upload and `files` as up to [`MAX_FILES`] uploads.
    pub fn upload_extraction(&self) -> Extraction {
        let schema = [
            FieldSchema::single("file"),
            FieldSchema::multiple("files").max_count(MAX_FILES),
        ];

        match self {
            StorageBackend::Memory(storage) => storage.fields(schema),
            StorageBackend::Disk(storage) => storage.fields(schema),
            StorageBackend::S3 { storage, sign } => storage.fields(
                schema
                    .into_iter()
                    .map(|field| SignedField::from(field).sign(sign.clone())),
            ),
        }
    }
}

pub fn setup_s3_client(config: &StorageConfig) -> aws_sdk_s3::Client {
    let mut builder = aws_sdk_s3::config::Builder::new()
        .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .force_path_style(config.s3_force_path_style);

    if let Some(endpoint) = &config.s3_endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.s3_access_key, &config.s3_secret_key) {
        builder = builder.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    aws_sdk_s3::Client::from_conf(builder.build())
}

/// Loads the SDK client from the default AWS provider chain, applying the
/// configured endpoint and credentials on top.
pub async fn load_s3_client(config: &StorageConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::from_env().region(Region::new(config.s3_region.clone()));

    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.s3_access_key, &config.s3_secret_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_force_path_style)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

pub async fn setup_storage(config: &StorageConfig) -> anyhow::Result<StorageBackend> {
    let backend = match config.backend.as_str() {
        "memory" => StorageBackend::Memory(MemoryStorage::default()),
        "disk" => {
            info!("💾 Disk Storage: {}", config.disk_dest);
            StorageBackend::Disk(DiskStorage::new(DiskStorageOptions {
                dest: Some(Resolver::fixed(config.disk_dest.clone())),
                filename: None,
            }))
        }
        "s3" => {
            info!(
                "☁️  S3 Storage: {} (Bucket: {})",
                config.s3_endpoint.as_deref().unwrap_or("aws"),
                config.s3_bucket
            );
            let client = if config.s3_access_key.is_some() && config.s3_secret_key.is_some() {
                setup_s3_client(config)
            } else {
                load_s3_client(config).await
            };
            let options =
                S3StorageOptions::new(config.s3_bucket.clone(), ClientProvider::client(client));
            StorageBackend::S3 {
                storage: S3Storage::new(options),
                sign: SignOptions::expires_in(Duration::from_secs(config.sign_expires_secs)),
            }
        }
        other => bail!("unknown storage backend: {}", other),
    };

    Ok(backend)
}
