use std::env;

/// Upload storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage backend: "memory", "disk" or "s3" (default: "disk")
    pub backend: String,

    /// Destination directory for the disk backend (default: "/tmp")
    pub disk_dest: String,

    /// Maximum request body size in bytes (default: 64 MB)
    pub max_upload_size: usize,

    /// S3-compatible endpoint, e.g. a MinIO URL. AWS when unset.
    pub s3_endpoint: Option<String>,

    /// S3 region (default: "us-east-1")
    pub s3_region: String,

    /// Target bucket (default: "uploads")
    pub s3_bucket: String,

    /// Static credentials, used only when both are set
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,

    /// Path-style addressing (default: true when an endpoint is set)
    pub s3_force_path_style: bool,

    /// Lifetime of signed URLs in seconds (default: 3600)
    pub sign_expires_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "disk".to_string(),
            disk_dest: "/tmp".to_string(),
            max_upload_size: 64 * 1024 * 1024, // 64 MB
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_bucket: "uploads".to_string(),
            s3_access_key: None,
            s3_secret_key: None,
            s3_force_path_style: false,
            sign_expires_secs: 3600,
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();
        let s3_endpoint = env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty());

        Self {
            backend: env::var("STORAGE_BACKEND")
                .map(|v| v.to_lowercase())
                .unwrap_or(default.backend),

            disk_dest: env::var("STORAGE_DISK_DEST").unwrap_or(default.disk_dest),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            s3_force_path_style: env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(s3_endpoint.is_some()),

            s3_endpoint,

            s3_region: env::var("S3_REGION").unwrap_or(default.s3_region),

            s3_bucket: env::var("S3_BUCKET").unwrap_or(default.s3_bucket),

            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),

            sign_expires_secs: env::var("S3_SIGN_EXPIRES_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sign_expires_secs),
        }
    }

    /// Create config for development (in-memory storage, local MinIO for S3)
    pub fn development() -> Self {
        Self {
            backend: "memory".to_string(),
            s3_endpoint: Some("http://127.0.0.1:9000".to_string()),
            s3_access_key: Some("minioadmin".to_string()),
            s3_secret_key: Some("minioadmin".to_string()),
            s3_force_path_style: true,
            ..Self::default()
        }
    }
}
