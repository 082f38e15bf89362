use super::file::Arity;
use super::form::FieldValue;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Values published for one field of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileEntry {
    Single(FieldValue),
    Multiple(Vec<FieldValue>),
}

impl FileEntry {
    pub fn as_single(&self) -> Option<&FieldValue> {
        match self {
            FileEntry::Single(value) => Some(value),
            FileEntry::Multiple(_) => None,
        }
    }

    pub fn as_multiple(&self) -> Option<&[FieldValue]> {
        match self {
            FileEntry::Multiple(values) => Some(values),
            FileEntry::Single(_) => None,
        }
    }
}

/// Backend-derived strings for one field (saved file names, signed URLs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldOutput {
    One(String),
    Many(Vec<String>),
}

impl FieldOutput {
    pub fn as_one(&self) -> Option<&str> {
        match self {
            FieldOutput::One(value) => Some(value),
            FieldOutput::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[String]> {
        match self {
            FieldOutput::Many(values) => Some(values),
            FieldOutput::One(_) => None,
        }
    }
}

/// Presigning parameters for the object-storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    pub expires_in: Duration,
    pub start_time: Option<SystemTime>,
}

impl SignOptions {
    pub fn expires_in(expires_in: Duration) -> Self {
        Self {
            expires_in,
            start_time: None,
        }
    }

    pub fn start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

/// Request-scoped upload results, read by handlers as
/// `Extension<UploadState>`.
///
/// Every extraction merges into the existing state, so chaining
/// `single("a")` and `single("b")` leaves both fields visible.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadState {
    pub files: HashMap<String, FileEntry>,
    #[serde(rename = "fileNames")]
    pub file_names: HashMap<String, FieldOutput>,
    #[serde(skip)]
    pub sign_config: HashMap<String, SignOptions>,
    #[serde(rename = "signedURLs")]
    pub signed_urls: HashMap<String, FieldOutput>,
}

impl UploadState {
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files.get(name)
    }

    pub fn file_name(&self, name: &str) -> Option<&FieldOutput> {
        self.file_names.get(name)
    }

    pub fn signed_url(&self, name: &str) -> Option<&FieldOutput> {
        self.signed_urls.get(name)
    }

    pub fn publish(&mut self, name: impl Into<String>, entry: FileEntry) {
        self.files.insert(name.into(), entry);
    }

    pub fn record_file_names(&mut self, field: &str, arity: Arity, names: Vec<String>) {
        merge_output(&mut self.file_names, field, arity, names);
    }

    pub fn record_signed_urls(&mut self, field: &str, arity: Arity, urls: Vec<String>) {
        merge_output(&mut self.signed_urls, field, arity, urls);
    }
}

// Single fields keep the latest value; multiple fields append in order.
fn merge_output(
    slot: &mut HashMap<String, FieldOutput>,
    field: &str,
    arity: Arity,
    values: Vec<String>,
) {
    if values.is_empty() {
        return;
    }

    match arity {
        Arity::Single => {
            if let Some(last) = values.into_iter().last() {
                slot.insert(field.to_string(), FieldOutput::One(last));
            }
        }
        Arity::Multiple => match slot.get_mut(field) {
            Some(FieldOutput::Many(existing)) => existing.extend(values),
            _ => {
                slot.insert(field.to_string(), FieldOutput::Many(values));
            }
        },
    }
}
