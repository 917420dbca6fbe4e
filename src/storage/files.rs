use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

const PDF_MAGIC: &[u8] = b"%PDF-";
const KEY_SUFFIX: &str = ".pdf";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found")]
    NotFound,
    #[error("invalid file key")]
    InvalidKey,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    fn from_io(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

/// Metadata for a blob written by [`FileStorage::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub key: String,
    pub size: i64,
    pub sha256: String,
}

/// PDF blobs on local disk, keyed by `<uuid>.pdf` and fanned out by the key's
/// first two characters.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("files"),
        }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.base_path.join(&key[0..2]).join(key)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join("tmp")
            .join(Uuid::new_v4().to_string())
    }

    /// Absolute on-disk location of a stored key.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.file_path(key))
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(fs::try_exists(self.file_path(key)).await?)
    }

    pub async fn get(&self, key: &str) -> Result<(BufReader<File>, i64), StorageError> {
        validate_key(key)?;
        let path = self.file_path(key);
        let file = File::open(&path).await.map_err(StorageError::from_io)?;

        let metadata = file.metadata().await?;
        let size = metadata.len() as i64;

        Ok((BufReader::new(file), size))
    }

    /// Writes `data` under a fresh key. The blob only becomes visible at its
    /// final path once fully written and synced.
    pub async fn put(&self, data: &[u8]) -> Result<StoredFile, StorageError> {
        let key = format!("{}{KEY_SUFFIX}", Uuid::new_v4());

        let mut hasher = Sha256::new();
        hasher.update(data);
        let sha256 = hex::encode(hasher.finalize());

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let final_path = self.file_path(&key);
        if let Err(e) = write_then_move(&temp_path, &final_path, data).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %temp_path.display(), "Failed to remove temp file: {cleanup}");
                }
            }
            return Err(StorageError::Io(e));
        }

        Ok(StoredFile {
            key,
            size: data.len() as i64,
            sha256,
        })
    }

    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        let path = self.file_path(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

async fn write_then_move(temp_path: &Path, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut temp_file = File::create(temp_path).await?;
    temp_file.write_all(data).await?;
    temp_file.sync_all().await?;
    drop(temp_file);

    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::rename(temp_path, final_path).await
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let stem = key
        .strip_suffix(KEY_SUFFIX)
        .ok_or(StorageError::InvalidKey)?;

    match Uuid::parse_str(stem) {
        Ok(uuid) if uuid.hyphenated().to_string() == stem => Ok(()),
        _ => Err(StorageError::InvalidKey),
    }
}

#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    validate_key(key).is_ok()
}

/// Checks the `%PDF-` header every PDF file starts with.
#[must_use]
pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}
