pub mod multipart;
pub mod storage;
