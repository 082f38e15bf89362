use super::{Resolver, StorageSink};
use crate::api::error::UploadError;
use crate::models::UploadFile;
use crate::services::context::RequestContext;
use crate::services::extractor::{Extraction, FieldExtractor, FieldSchema};
use crate::utils::validation::join_destination;
use async_trait::async_trait;
use futures::StreamExt;
use futures::future::join_all;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub const DEFAULT_DEST: &str = "/tmp";

#[derive(Debug, Clone, Default)]
pub struct DiskStorageOptions {
    /// Destination directory, fixed or computed per file. Defaults to `/tmp`.
    pub dest: Option<Resolver>,
    /// Stored file name. Defaults to the upload's file name; when set, the
    /// resolved names are published under `fileNames`.
    pub filename: Option<Resolver>,
}

/// Writes uploads to the local filesystem.
#[derive(Clone)]
pub struct DiskStorage {
    extractor: FieldExtractor,
}

struct DiskSink {
    dest: Resolver,
    filename: Option<Resolver>,
}

impl DiskSink {
    async fn write_file(&self, ctx: &RequestContext, file: &UploadFile) -> Result<String, UploadError> {
        let dest = self.dest.resolve(ctx, file).await;

        let filename = match &self.filename {
            Some(filename) => filename.resolve(ctx, file).await,
            None => file.name().to_string(),
        };
        let path = join_destination(&dest, &filename).map_err(UploadError::InvalidFileName)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // A failed write leaves whatever was written so far in place.
        let mut output = fs::File::create(&path).await?;
        let mut chunks = file.stream();
        while let Some(chunk) = chunks.next().await {
            output.write_all(&chunk).await?;
        }
        output.flush().await?;

        debug!("Wrote {} bytes to {}", file.size(), path.display());
        Ok(filename)
    }
}

#[async_trait]
impl StorageSink for DiskSink {
    /// Published `fileNames` hold completed writes only, in input order.
    async fn store(&self, ctx: &RequestContext, files: &[UploadFile]) -> Result<(), UploadError> {
        let results = join_all(files.iter().map(|file| self.write_file(ctx, file))).await;

        let mut saved = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(name) => saved.push(name),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if self.filename.is_some() {
            if let Some(first) = files.first() {
                let field = first.field();
                ctx.state()
                    .record_file_names(&field.name, field.arity, saved);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl DiskStorage {
    pub fn new(options: DiskStorageOptions) -> Self {
        let sink = DiskSink {
            dest: options.dest.unwrap_or_else(|| Resolver::fixed(DEFAULT_DEST)),
            filename: options.filename,
        };

        Self {
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
}

impl Default for DiskStorage {
    fn default() -> Self {
        Self::new(DiskStorageOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldOutput, FormData, FormFile};

    fn file(name: &str) -> FormFile {
        FormFile::new(name, Some("text/plain".to_string()), format!("content of {name}"))
    }

    #[tokio::test]
    async fn test_failed_write_is_left_out_of_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(DiskStorageOptions {
            dest: Some(Resolver::fixed(dir.path().to_string_lossy())),
            filename: Some(Resolver::with(|_, file| match file.name() {
                "b.txt" => "../b.txt".to_string(),
                name => format!("saved-{name}"),
            })),
        });
        let form = FormData::new()
            .with_file("docs", file("a.txt"))
            .with_file("docs", file("b.txt"))
            .with_file("docs", file("c.txt"));
        let ctx = RequestContext::default();

        let err = storage
            .multiple("docs", None)
            .run(&ctx, &form)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileName(_)));

        let state = ctx.into_state();
        assert_eq!(
            state.file_name("docs"),
            Some(&FieldOutput::Many(vec![
                "saved-a.txt".to_string(),
                "saved-c.txt".to_string(),
            ]))
        );
        assert!(dir.path().join("saved-c.txt").exists());
        assert!(!dir.path().join("b.txt").exists());
    }
}
