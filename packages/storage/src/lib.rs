#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Media file storage for incident attachments.
//!
//! The store hands out opaque file ids and keeps the on-disk layout
//! (`<root>/<bucket>/<id>`) private behind the [`FileStore`] trait, so
//! the server can swap the local-disk backend for an object store without
//! touching intake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Bucket name for incident media attachments.
pub const INCIDENT_MEDIA_BUCKET: &str = "incident-media";

/// Errors from file store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file id contained path components.
    #[error("Invalid file id: {id}")]
    InvalidFileId {
        /// The offending id.
        id: String,
    },
}

/// Abstract file storage collaborator.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores `bytes` in `bucket` and returns the new opaque file id.
    ///
    /// The original filename only contributes its extension, so the id
    /// stays opaque while downloads keep a usable suffix.
    async fn upload(
        &self,
        bucket: &str,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    /// Deletes a previously uploaded file. Unknown ids are a no-op, so
    /// cleanup after a failed intake can't itself fail on a half-written
    /// submission.
    async fn delete(&self, bucket: &str, file_id: &str) -> Result<(), StorageError>;
}

/// Local-disk [`FileStore`] rooted at a data directory.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Creates a store rooted at `root`. Directories are created lazily on
    /// first upload per bucket.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store rooted at the `RELIEF_MAP_MEDIA_DIR` environment
    /// variable, falling back to `data/media`.
    #[must_use]
    pub fn from_env() -> Self {
        let root =
            std::env::var("RELIEF_MAP_MEDIA_DIR").unwrap_or_else(|_| "data/media".to_string());
        Self::new(root)
    }

    /// Returns the directory that backs `bucket`.
    #[must_use]
    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn checked_path(&self, bucket: &str, file_id: &str) -> Result<PathBuf, StorageError> {
        if file_id.is_empty()
            || file_id.contains('/')
            || file_id.contains('\\')
            || file_id.contains("..")
        {
            return Err(StorageError::InvalidFileId {
                id: file_id.to_string(),
            });
        }
        Ok(self.bucket_dir(bucket).join(file_id))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn upload(
        &self,
        bucket: &str,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let dir = self.bucket_dir(bucket);
        tokio::fs::create_dir_all(&dir).await?;

        let id = match filename.and_then(sanitized_extension) {
            Some(ext) => format!("{}.{ext}", uuid::Uuid::new_v4()),
            None => uuid::Uuid::new_v4().to_string(),
        };

        tokio::fs::write(dir.join(&id), bytes).await?;
        log::debug!("Stored {} bytes as {bucket}/{id}", bytes.len());

        Ok(id)
    }

    async fn delete(&self, bucket: &str, file_id: &str) -> Result<(), StorageError> {
        let path = self.checked_path(bucket, file_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Extracts a safe lowercase extension from a client-supplied filename.
fn sanitized_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
