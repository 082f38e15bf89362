use super::file::FormFile;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::HashMap;

/// One value of a multipart field: either plain text or a file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(FormFile),
}

impl FieldValue {
    pub fn as_file(&self) -> Option<&FormFile> {
        match self {
            FieldValue::File(file) => Some(file),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::File(_) => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FieldValue::File(_))
    }
}

impl Serialize for FormFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FormFile", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("type", &self.content_type)?;
        state.serialize_field("size", &self.size())?;
        state.end()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(text) => serializer.serialize_str(text),
            FieldValue::File(file) => file.serialize(serializer),
        }
    }
}

/// Parsed body of a form submission.
///
/// Every field name maps to the values sent under it, in the order they
/// appeared in the body.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<FieldValue>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.entry(name.into()).or_default().push(value);
    }

    pub fn with_text(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.append(name, FieldValue::Text(text.into()));
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: FormFile) -> Self {
        self.append(name, FieldValue::File(file));
        self
    }

    /// All values sent under `name`, or an empty slice.
    pub fn get_all(&self, name: &str) -> &[FieldValue] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first value sent under `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.get_all(name).first()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
