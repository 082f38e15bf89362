use super::{Resolver, StorageSink};
use crate::api::error::UploadError;
use crate::models::UploadFile;
use crate::services::context::RequestContext;
use crate::services::extractor::{Extraction, FieldExtractor, FieldSchema};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MemoryStorageOptions {
    /// Key under which each file is stored. Defaults to the upload's file name.
    pub key: Option<Resolver>,
}

/// In-process key to blob storage.
///
/// Entries live as long as the storage and are shared by every request it
/// serves; a later write to the same key replaces the earlier one. There is
/// no eviction or size bound.
#[derive(Clone)]
pub struct MemoryStorage {
    buffer: Arc<DashMap<String, Bytes>>,
    extractor: FieldExtractor,
}

struct MemorySink {
    buffer: Arc<DashMap<String, Bytes>>,
    key: Resolver,
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn store(&self, ctx: &RequestContext, files: &[UploadFile]) -> Result<(), UploadError> {
        for file in files {
            let key = self.key.resolve(ctx, file).await;
            debug!("Storing {} bytes in memory under '{}'", file.size(), key);
            self.buffer.insert(key, file.bytes());
        }
        Ok(())
    }
}

impl MemoryStorage {
    pub fn new(options: MemoryStorageOptions) -> Self {
        let buffer = Arc::new(DashMap::new());
        let sink = MemorySink {
            buffer: buffer.clone(),
            key: options.key.unwrap_or_else(Resolver::file_name),
        };

        Self {
            buffer,
            extractor: FieldExtractor::new(sink),
        }
    }

    pub fn single(&self, name: impl Into<String>) -> Extraction {
        self.extractor.single(name)
    }

    pub fn array(&self, name: impl Into<String>, max_count: Option<usize>) -> Extraction {
        self.extractor.array(name, max_count)
    }

    pub fn multiple(&self, name: impl Into<String>, max_count: Option<usize>) -> Extraction {
        self.extractor.multiple(name, max_count)
    }

    pub fn fields(&self, schema: impl IntoIterator<Item = FieldSchema>) -> Extraction {
        self.extractor.fields(schema)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.buffer.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.buffer.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.buffer.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(MemoryStorageOptions::default())
    }
}
