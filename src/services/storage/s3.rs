use super::{Resolver, StorageSink};
use crate::api::error::UploadError;
use crate::models::{SignOptions, UploadFile};
use crate::services::context::RequestContext;
use crate::services::extractor::{Extraction, FieldExtractor, FieldSchema};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ObjectCannedAcl, StorageClass};
use bytes::Bytes;
use futures::StreamExt;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Extra fields merged into every put request.
#[derive(Debug, Clone, Default)]
pub struct UploadParams {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub acl: Option<String>,
    pub storage_class: Option<String>,
    pub tagging: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Payload of a put request.
#[derive(Debug, Clone)]
pub enum ObjectBody {
    /// The whole file as one shared buffer.
    Buffer(Bytes),
    /// The file itself, to be read through [`UploadFile::stream`].
    Stream(UploadFile),
}

impl ObjectBody {
    pub async fn into_bytes(self) -> Bytes {
        match self {
            ObjectBody::Buffer(bytes) => bytes,
            ObjectBody::Stream(file) => {
                let chunks: Vec<Bytes> = file.stream().collect().await;
                Bytes::from(chunks.concat())
            }
        }
    }
}

/// How file bytes are handed to [`S3Object::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyMode {
    #[default]
    Buffered,
    Streaming,
}

#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: ObjectBody,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub params: UploadParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetObjectRequest {
    pub bucket: String,
    pub key: String,
}

/// Stores an object.
#[async_trait]
pub trait S3Object: Send + Sync {
    async fn put(&self, request: PutObjectRequest) -> Result<()>;
}

/// Produces a time-limited GET URL for an object.
#[async_trait]
pub trait S3Sign: Send + Sync {
    async fn signed_url(&self, request: GetObjectRequest, sign: &SignOptions) -> Result<String>;
}

pub trait S3Repository: S3Object + S3Sign {}

impl<T: S3Object + S3Sign> S3Repository for T {}

/// [`S3Repository`] backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsS3Repository {
    client: Client,
}

impl AwsS3Repository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl S3Object for AwsS3Repository {
    async fn put(&self, request: PutObjectRequest) -> Result<()> {
        let PutObjectRequest {
            bucket,
            key,
            body,
            content_type,
            content_length,
            params,
        } = request;

        // The SDK signs the payload, so a streamed body is gathered first.
        let body = body.into_bytes().await;
        let metadata = (!params.metadata.is_empty()).then_some(params.metadata);

        self.client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .set_content_type(content_type)
            .content_length(content_length as i64)
            .set_cache_control(params.cache_control)
            .set_content_disposition(params.content_disposition)
            .set_content_encoding(params.content_encoding)
            .set_content_language(params.content_language)
            .set_acl(params.acl.as_deref().map(ObjectCannedAcl::from))
            .set_storage_class(params.storage_class.as_deref().map(StorageClass::from))
            .set_tagging(params.tagging)
            .set_metadata(metadata)
            .send()
            .await?;

        debug!("S3 put_object succeeded: {}/{}", bucket, key);
        Ok(())
    }
}

#[async_trait]
impl S3Sign for AwsS3Repository {
    async fn signed_url(&self, request: GetObjectRequest, sign: &SignOptions) -> Result<String> {
        let mut config = PresigningConfig::builder().expires_in(sign.expires_in);
        if let Some(start_time) = sign.start_time {
            config = config.start_time(start_time);
        }

        let presigned = self
            .client
            .get_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .presigned(config.build()?)
            .await?;

        Ok(presigned.uri().to_string())
    }
}

type RepositoryFn = dyn Fn(&RequestContext, &UploadFile) -> Arc<dyn S3Repository> + Send + Sync;

/// Source of the repository used for an upload, resolved once per file.
#[derive(Clone)]
pub enum ClientProvider {
    Fixed(Arc<dyn S3Repository>),
    PerRequest(Arc<RepositoryFn>),
}

impl ClientProvider {
    pub fn client(client: Client) -> Self {
        ClientProvider::Fixed(Arc::new(AwsS3Repository::new(client)))
    }

    pub fn repository(repository: impl S3Repository + 'static) -> Self {
        ClientProvider::Fixed(Arc::new(repository))
    }

    /// Builds an SDK client per file, e.g. to pick credentials per tenant.
    pub fn per_request_client<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, &UploadFile) -> Client + Send + Sync + 'static,
    {
        ClientProvider::PerRequest(Arc::new(
            move |ctx: &RequestContext, file: &UploadFile| -> Arc<dyn S3Repository> {
                Arc::new(AwsS3Repository::new(f(ctx, file)))
            },
        ))
    }

    pub fn per_request<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, &UploadFile) -> Arc<dyn S3Repository> + Send + Sync + 'static,
    {
        ClientProvider::PerRequest(Arc::new(f))
    }

    fn resolve(&self, ctx: &RequestContext, file: &UploadFile) -> Arc<dyn S3Repository> {
        match self {
            ClientProvider::Fixed(repository) => repository.clone(),
            ClientProvider::PerRequest(f) => f(ctx, file),
        }
    }
}

#[derive(Clone)]
pub struct S3StorageOptions {
    /// Object key. Defaults to the upload's file name.
    pub key: Option<Resolver>,
    pub bucket: Resolver,
    pub client: ClientProvider,
    pub params: UploadParams,
    pub body_mode: BodyMode,
}

impl S3StorageOptions {
    pub fn new(bucket: impl Into<Resolver>, client: ClientProvider) -> Self {
        Self {
            key: None,
            bucket: bucket.into(),
            client,
            params: UploadParams::default(),
            body_mode: BodyMode::default(),
        }
    }

    pub fn key(mut self, key: Resolver) -> Self {
        self.key = Some(key);
        self
    }

    pub fn params(mut self, params: UploadParams) -> Self {
        self.params = params;
        self
    }

    pub fn body_mode(mut self, body_mode: BodyMode) -> Self {
        self.body_mode = body_mode;
        self
    }
}

/// A field declaration with optional presigning.
#[derive(Debug, Clone)]
pub struct SignedField {
    pub schema: FieldSchema,
    pub sign: Option<SignOptions>,
}

impl SignedField {
    pub fn sign(mut self, sign: SignOptions) -> Self {
        self.sign = Some(sign);
        self
    }
}

impl From<FieldSchema> for SignedField {
    fn from(schema: FieldSchema) -> Self {
        Self { schema, sign: None }
    }
}

/// Uploads each file to object storage and, for fields with presigning
/// configured, publishes a signed GET URL under `signedURLs`.
#[derive(Clone)]
pub struct S3Storage {
    extractor: FieldExtractor,
}

struct S3Sink {
    key: Resolver,
    bucket: Resolver,
    client: ClientProvider,
    params: UploadParams,
    body_mode: BodyMode,
}

impl S3Sink {
    async fn upload(&self, ctx: &RequestContext, file: &UploadFile) -> Result<Option<String>> {
        let key = self.key.resolve(ctx, file).await;
        let bucket = self.bucket.resolve(ctx, file).await;

        let body = match self.body_mode {
            BodyMode::Buffered => ObjectBody::Buffer(file.bytes()),
            BodyMode::Streaming => ObjectBody::Stream(file.clone()),
        };
        let put = PutObjectRequest {
            bucket: bucket.clone(),
            key: key.clone(),
            body,
            content_type: file.content_type().map(str::to_string),
            content_length: file.size(),
            params: self.params.clone(),
        };

        let sign = ctx.state().sign_config.get(&file.field().name).cloned();
        let repository = self.client.resolve(ctx, file);

        repository.put(put).await?;
        debug!("Uploaded {} ({} bytes) to {}/{}", file.name(), file.size(), bucket, key);

        let Some(sign) = sign else {
            return Ok(None);
        };

        let url = repository
            .signed_url(GetObjectRequest { bucket, key }, &sign)
            .await?;
        Ok(Some(url))
    }
}

#[async_trait]
impl StorageSink for S3Sink {
    async fn store(&self, ctx: &RequestContext, files: &[UploadFile]) -> Result<(), UploadError> {
        let results = join_all(files.iter().map(|file| self.upload(ctx, file))).await;

        let mut urls = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Some(url)) => urls.push(url),
                Ok(None) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(first) = files.first() {
            let field = first.field();
            ctx.state()
                .record_signed_urls(&field.name, field.arity, urls);
        }

        match first_error {
            Some(e) => Err(UploadError::Storage(e)),
            None => Ok(()),
        }
    }
}

impl S3Storage {
    pub fn new(options: S3StorageOptions) -> Self {
        let sink = S3Sink {
            key: options.key.unwrap_or_else(Resolver::file_name),
            bucket: options.bucket,
            client: options.client,
            params: options.params,
            body_mode: options.body_mode,
        };

        Self {
            extractor: FieldExtractor::new(sink),
        }
    }

    pub fn single(&self, name: impl Into<String>, sign: Option<SignOptions>) -> Extraction {
        self.fields([SignedField {
            schema: FieldSchema::single(name),
            sign,
        }])
    }

    pub fn multiple(
        &self,
        name: impl Into<String>,
        max_count: Option<usize>,
        sign: Option<SignOptions>,
    ) -> Extraction {
        let mut schema = FieldSchema::multiple(name);
        schema.max_count = max_count;
        self.fields([SignedField { schema, sign }])
    }

    pub fn array(
        &self,
        name: impl Into<String>,
        max_count: Option<usize>,
        sign: Option<SignOptions>,
    ) -> Extraction {
        self.multiple(name, max_count, sign)
    }

    pub fn fields(&self, schema: impl IntoIterator<Item = SignedField>) -> Extraction {
        let fields: Vec<SignedField> = schema.into_iter().collect();

        let mut extraction = self
            .extractor
            .fields(fields.iter().map(|field| field.schema.clone()));
        for field in fields {
            if let Some(sign) = field.sign {
                extraction = extraction.with_sign(field.schema.name, sign);
            }
        }
        extraction
    }
}
