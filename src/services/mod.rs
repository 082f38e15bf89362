pub mod context;
pub mod extractor;
pub mod storage;
