use bytes::Bytes;
use futures::stream::Iter;
use serde::Serialize;

/// Chunk size used when a file is read as a stream (64 KiB).
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Whether a declared field expects one value or zero-or-more values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    Single,
    Multiple,
}

/// The field an uploaded file was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    pub name: String,
    pub arity: Arity,
}

impl FieldRef {
    pub fn new(name: impl Into<String>, arity: Arity) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

/// A file part exactly as the multipart parser produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type,
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// An extracted file handed to a storage sink.
///
/// Wraps the parsed [`FormFile`] together with the field it was found in.
/// The payload is a reference-counted buffer, so cloning is cheap and the
/// sink may copy or stream it freely.
#[derive(Debug, Clone)]
pub struct UploadFile {
    file: FormFile,
    field: FieldRef,
}

impl UploadFile {
    pub fn new(file: FormFile, field: FieldRef) -> Self {
        Self { file, field }
    }

    /// Declared file name, as sent by the client.
    pub fn name(&self) -> &str {
        &self.file.name
    }

    /// Media type declared for the part, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.file.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.file.size()
    }

    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    pub fn bytes(&self) -> Bytes {
        self.file.data.clone()
    }

    /// Name without its last `.`-delimited extension.
    ///
    /// `"sample1.txt.zip"` yields `"sample1.txt"`; a name without a dot is
    /// returned unchanged.
    pub fn originalname(&self) -> &str {
        match self.file.name.rfind('.') {
            Some(dot) => &self.file.name[..dot],
            None => &self.file.name,
        }
    }

    /// Everything after the last `.`, or an empty string.
    pub fn extension(&self) -> &str {
        match self.file.name.rfind('.') {
            Some(dot) => &self.file.name[dot + 1..],
            None => "",
        }
    }

    /// Reads the payload as a sequence of chunks of at most
    /// [`STREAM_CHUNK_SIZE`] bytes.
    pub fn stream(&self) -> Iter<std::vec::IntoIter<Bytes>> {
        let data = self.file.data.clone();
        let chunks = (0..data.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(move |start| data.slice(start..(start + STREAM_CHUNK_SIZE).min(data.len())))
            .collect::<Vec<_>>();
        futures::stream::iter(chunks)
    }

    pub fn into_form_file(self) -> FormFile {
        self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn upload(name: &str) -> UploadFile {
        UploadFile::new(
            FormFile::new(name, Some("text/plain".to_string()), "Hello"),
            FieldRef::new("file", Arity::Single),
        )
    }

    #[test]
    fn test_name_without_dot() {
        let file = upload("README");
        assert_eq!(file.originalname(), "README");
        assert_eq!(file.extension(), "");
    }

    #[test]
    fn test_name_with_extension() {
        let file = upload("sample1.txt");
        assert_eq!(file.originalname(), "sample1");
        assert_eq!(file.extension(), "txt");
    }

    #[test]
    fn test_only_last_segment_is_extension() {
        let file = upload("sample1.txt.zip");
        assert_eq!(file.originalname(), "sample1.txt");
        assert_eq!(file.extension(), "zip");

        let file = upload("a.b.c");
        assert_eq!(file.originalname(), "a.b");
        assert_eq!(file.extension(), "c");
    }

    #[test]
    fn test_case_is_preserved() {
        let file = upload("Photo.JPG");
        assert_eq!(file.originalname(), "Photo");
        assert_eq!(file.extension(), "JPG");
    }

    #[test]
    fn test_trailing_and_leading_dots() {
        let file = upload("archive.");
        assert_eq!(file.originalname(), "archive");
        assert_eq!(file.extension(), "");

        let file = upload(".env");
        assert_eq!(file.originalname(), "");
        assert_eq!(file.extension(), "env");
    }

    #[tokio::test]
    async fn test_stream_yields_all_bytes_in_chunks() {
        let data = vec![7u8; STREAM_CHUNK_SIZE * 2 + 10];
        let file = UploadFile::new(
            FormFile::new("big.bin", None, data.clone()),
            FieldRef::new("file", Arity::Single),
        );

        let chunks: Vec<Bytes> = file.stream().collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 10);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_stream_of_empty_file() {
        let file = UploadFile::new(
            FormFile::new("empty.txt", None, Bytes::new()),
            FieldRef::new("file", Arity::Single),
        );
        let chunks: Vec<Bytes> = file.stream().collect().await;
        assert!(chunks.is_empty());
        assert_eq!(file.size(), 0);
    }
}
