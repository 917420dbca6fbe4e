mod files;

pub use files::{FileStorage, StorageError, StoredFile, is_pdf, is_valid_key};
