pub mod upload;

pub use upload::{ParsedForm, upload_middleware};
