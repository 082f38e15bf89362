pub mod file;
pub mod form;
pub mod state;

pub use file::{Arity, FieldRef, FormFile, UploadFile};
pub use form::{FieldValue, FormData};
pub use state::{FieldOutput, FileEntry, SignOptions, UploadState};
