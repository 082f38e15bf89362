//! Field extraction and dispatch.
//!
//! A [`FieldExtractor`] turns a parsed form into typed file batches for the
//! declared fields, enforces count limits, hands each batch to its storage
//! sink and publishes the raw values into the request's [`UploadState`].
//!
//! [`UploadState`]: crate::models::UploadState

use crate::api::error::UploadError;
use crate::models::{Arity, FieldRef, FieldValue, FileEntry, FormData, SignOptions, UploadFile};
use crate::services::context::RequestContext;
use crate::services::storage::StorageSink;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// A field declared by the route author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub arity: Arity,
    /// Upper bound on file values; only meaningful for multiple fields.
    pub max_count: Option<usize>,
}

impl FieldSchema {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: Arity::Single,
            max_count: None,
        }
    }

    pub fn multiple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: Arity::Multiple,
            max_count: None,
        }
    }

    pub fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }
}

/// Builds [`Extraction`]s that hand extracted files to one storage sink.
#[derive(Clone, Default)]
pub struct FieldExtractor {
    sink: Option<Arc<dyn StorageSink>>,
}

impl FieldExtractor {
    pub fn new(sink: impl StorageSink + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    pub fn from_arc(sink: Arc<dyn StorageSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// An extractor without storage: values are only published to the
    /// request state.
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn single(&self, name: impl Into<String>) -> Extraction {
        self.fields([FieldSchema::single(name)])
    }

    pub fn array(&self, name: impl Into<String>, max_count: Option<usize>) -> Extraction {
        let mut schema = FieldSchema::multiple(name);
        schema.max_count = max_count;
        self.fields([schema])
    }

    pub fn multiple(&self, name: impl Into<String>, max_count: Option<usize>) -> Extraction {
        self.array(name, max_count)
    }

    pub fn fields(&self, schema: impl IntoIterator<Item = FieldSchema>) -> Extraction {
        Extraction {
            sink: self.sink.clone(),
            fields: schema.into_iter().collect(),
            sign_config: Vec::new(),
        }
    }
}

/// A configured extraction, ready to run against a request.
///
/// This is the state type of [`upload_middleware`].
///
/// [`upload_middleware`]: crate::api::middleware::upload::upload_middleware
#[derive(Clone)]
pub struct Extraction {
    sink: Option<Arc<dyn StorageSink>>,
    fields: Vec<FieldSchema>,
    sign_config: Vec<(String, SignOptions)>,
}

impl Extraction {
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Records presigning options for `field` in the request state before
    /// anything is dispatched.
    pub fn with_sign(mut self, field: impl Into<String>, sign: SignOptions) -> Self {
        self.sign_config.push((field.into(), sign));
        self
    }

    /// Runs every declared field concurrently and waits for all of them.
    ///
    /// Fields that were stored stay stored when another field fails; the
    /// first failure is returned once everything has settled.
    pub async fn run(&self, ctx: &RequestContext, form: &FormData) -> Result<(), UploadError> {
        if !self.sign_config.is_empty() {
            let mut state = ctx.state();
            for (field, sign) in &self.sign_config {
                state.sign_config.insert(field.clone(), sign.clone());
            }
        }

        let results = join_all(
            self.fields
                .iter()
                .map(|field| self.dispatch(ctx, form, field)),
        )
        .await;

        results.into_iter().collect()
    }

    async fn dispatch(
        &self,
        ctx: &RequestContext,
        form: &FormData,
        field: &FieldSchema,
    ) -> Result<(), UploadError> {
        match field.arity {
            Arity::Single => self.dispatch_single(ctx, form, field).await,
            Arity::Multiple => self.dispatch_multiple(ctx, form, field).await,
        }
    }

    async fn dispatch_single(
        &self,
        ctx: &RequestContext,
        form: &FormData,
        field: &FieldSchema,
    ) -> Result<(), UploadError> {
        let Some(value) = form.get(&field.name) else {
            return Ok(());
        };

        if let FieldValue::File(file) = value {
            let upload = UploadFile::new(file.clone(), FieldRef::new(&field.name, Arity::Single));
            self.store(ctx, &field.name, &[upload]).await?;
        }

        ctx.state()
            .publish(field.name.clone(), FileEntry::Single(value.clone()));
        Ok(())
    }

    async fn dispatch_multiple(
        &self,
        ctx: &RequestContext,
        form: &FormData,
        field: &FieldSchema,
    ) -> Result<(), UploadError> {
        let values = form.get_all(&field.name);
        if values.is_empty() {
            return Ok(());
        }

        let files: Vec<UploadFile> = values
            .iter()
            .filter_map(FieldValue::as_file)
            .map(|file| {
                UploadFile::new(file.clone(), FieldRef::new(&field.name, Arity::Multiple))
            })
            .collect();

        // A limit of zero leaves the field unbounded.
        if let Some(max_count) = field.max_count.filter(|&max| max > 0) {
            if files.len() > max_count {
                return Err(UploadError::TooManyFiles {
                    field: field.name.clone(),
                    max_count,
                    received: files.len(),
                });
            }
        }

        if !files.is_empty() {
            self.store(ctx, &field.name, &files).await?;
        }

        ctx.state()
            .publish(field.name.clone(), FileEntry::Multiple(values.to_vec()));
        Ok(())
    }

    async fn store(
        &self,
        ctx: &RequestContext,
        field: &str,
        files: &[UploadFile],
    ) -> Result<(), UploadError> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };

        debug!("Dispatching {} file(s) for field '{}'", files.len(), field);
        sink.store(ctx, files).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormFile;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingSink {
        fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }

        fn total_files(&self) -> usize {
            self.batches().iter().map(Vec::len).sum()
        }
    }

    #[async_trait]
    impl StorageSink for Arc<RecordingSink> {
        async fn store(
            &self,
            _ctx: &RequestContext,
            files: &[UploadFile],
        ) -> Result<(), UploadError> {
            self.batches
                .lock()
                .unwrap()
                .push(files.iter().map(|f| f.name().to_string()).collect());
            Ok(())
        }
    }

    fn file(name: &str) -> FormFile {
        FormFile::new(name, Some("text/plain".to_string()), format!("content of {name}"))
    }

    fn extractor() -> (FieldExtractor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (FieldExtractor::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_single_stores_file_and_publishes_raw_value() {
        let (extractor, sink) = extractor();
        let form = FormData::new().with_file("file", file("sample1.txt"));
        let ctx = RequestContext::default();

        extractor.single("file").run(&ctx, &form).await.unwrap();

        assert_eq!(sink.batches(), vec![vec!["sample1.txt".to_string()]]);
        let state = ctx.into_state();
        assert_eq!(
            state.file("file"),
            Some(&FileEntry::Single(FieldValue::File(file("sample1.txt"))))
        );
    }

    #[tokio::test]
    async fn test_single_absent_field_is_noop() {
        let (extractor, sink) = extractor();
        let ctx = RequestContext::default();

        extractor
            .single("file")
            .run(&ctx, &FormData::new())
            .await
            .unwrap();

        assert!(sink.batches().is_empty());
        assert!(ctx.into_state().file("file").is_none());
    }

    #[tokio::test]
    async fn test_single_text_value_passes_through() {
        let (extractor, sink) = extractor();
        let form = FormData::new().with_text("file", "Hello upload storage");
        let ctx = RequestContext::default();

        extractor.single("file").run(&ctx, &form).await.unwrap();

        assert!(sink.batches().is_empty());
        let state = ctx.into_state();
        let value = state.file("file").and_then(FileEntry::as_single).unwrap();
        assert_eq!(value.as_text(), Some("Hello upload storage"));
    }

    #[tokio::test]
    async fn test_chained_singles_merge_state() {
        let (extractor, sink) = extractor();
        let form = FormData::new()
            .with_file("file1", file("sample1.txt"))
            .with_file("file2", file("sample2.txt"));
        let ctx = RequestContext::default();

        extractor.single("file1").run(&ctx, &form).await.unwrap();
        extractor.single("file2").run(&ctx, &form).await.unwrap();

        assert_eq!(sink.total_files(), 2);
        let state = ctx.into_state();
        assert!(state.file("file1").is_some());
        assert!(state.file("file2").is_some());
    }

    #[tokio::test]
    async fn test_array_within_limit_dispatches_once() {
        let (extractor, sink) = extractor();
        let form = FormData::new()
            .with_file("files", file("a.txt"))
            .with_file("files", file("b.txt"));
        let ctx = RequestContext::default();

        extractor.array("files", Some(3)).run(&ctx, &form).await.unwrap();

        assert_eq!(
            sink.batches(),
            vec![vec!["a.txt".to_string(), "b.txt".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_array_over_limit_never_reaches_sink() {
        let (extractor, sink) = extractor();
        let mut form = FormData::new();
        for i in 0..10 {
            form = form.with_file("files", file(&format!("{i}.txt")));
        }
        let ctx = RequestContext::default();

        let err = extractor
            .array("files", Some(3))
            .run(&ctx, &form)
            .await
            .unwrap_err();

        assert!(err.is_too_many_files());
        assert!(sink.batches().is_empty());
        assert!(ctx.into_state().file("files").is_none());
    }

    #[tokio::test]
    async fn test_limit_counts_files_only() {
        let (extractor, sink) = extractor();
        let form = FormData::new()
            .with_file("files", file("a.txt"))
            .with_text("files", "caption one")
            .with_text("files", "caption two")
            .with_file("files", file("b.txt"));
        let ctx = RequestContext::default();

        extractor.multiple("files", Some(2)).run(&ctx, &form).await.unwrap();

        assert_eq!(sink.total_files(), 2);
        let state = ctx.into_state();
        let values = state.file("files").and_then(FileEntry::as_multiple).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[1].as_text(), Some("caption one"));
    }

    #[tokio::test]
    async fn test_zero_limit_is_unbounded() {
        let (extractor, sink) = extractor();
        let form = FormData::new()
            .with_file("files", file("a.txt"))
            .with_file("files", file("b.txt"));
        let ctx = RequestContext::default();

        extractor
            .multiple("files", Some(0))
            .run(&ctx, &form)
            .await
            .unwrap();

        assert_eq!(
            sink.batches(),
            vec![vec!["a.txt".to_string(), "b.txt".to_string()]]
        );
        let state = ctx.into_state();
        let values = state.file("files").and_then(FileEntry::as_multiple).unwrap();
        assert_eq!(values.len(), 2);
    }

    #[tokio::test]
    async fn test_fields_dispatches_each_field() {
        let (extractor, sink) = extractor();
        let form = FormData::new()
            .with_file("a", file("a.txt"))
            .with_file("b", file("b1.txt"))
            .with_file("b", file("b2.txt"));
        let ctx = RequestContext::default();

        extractor
            .fields([
                FieldSchema::single("a"),
                FieldSchema::multiple("b").max_count(2),
            ])
            .run(&ctx, &form)
            .await
            .unwrap();

        assert_eq!(sink.batches().len(), 2);
        assert_eq!(sink.total_files(), 3);
        let state = ctx.into_state();
        assert!(state.file("a").and_then(FileEntry::as_single).is_some());
        assert_eq!(
            state.file("b").and_then(FileEntry::as_multiple).map(<[_]>::len),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_fields_failure_does_not_roll_back_other_fields() {
        let (extractor, sink) = extractor();
        let form = FormData::new()
            .with_file("a", file("a.txt"))
            .with_file("b", file("b1.txt"))
            .with_file("b", file("b2.txt"));
        let ctx = RequestContext::default();

        let err = extractor
            .fields([
                FieldSchema::single("a"),
                FieldSchema::multiple("b").max_count(1),
            ])
            .run(&ctx, &form)
            .await
            .unwrap_err();

        assert!(err.is_too_many_files());
        assert_eq!(sink.batches(), vec![vec!["a.txt".to_string()]]);
        let state = ctx.into_state();
        assert!(state.file("a").is_some());
        assert!(state.file("b").is_none());
    }

    #[tokio::test]
    async fn test_passthrough_publishes_without_sink() {
        let form = FormData::new().with_file("file", file("sample1.txt"));
        let ctx = RequestContext::default();

        FieldExtractor::passthrough()
            .single("file")
            .run(&ctx, &form)
            .await
            .unwrap();

        assert!(ctx.into_state().file("file").is_some());
    }

    #[tokio::test]
    async fn test_sign_config_recorded_before_dispatch() {
        let (extractor, _sink) = extractor();
        let ctx = RequestContext::default();

        extractor
            .single("image")
            .with_sign("image", SignOptions::expires_in(std::time::Duration::from_secs(60)))
            .run(&ctx, &FormData::new())
            .await
            .unwrap();

        let state = ctx.into_state();
        assert_eq!(
            state.sign_config.get("image").map(|s| s.expires_in.as_secs()),
            Some(60)
        );
    }
}
