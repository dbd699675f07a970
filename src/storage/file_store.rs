//! File store: the two storage bins plus file lifecycle
//!
//! A file enters through `open_for_upload` (temp file in 'uploading'),
//! gets verified by the caller, and is promoted to its canonical path in
//! 'stored' with a single atomic rename. Readers of 'stored' therefore
//! never observe partial writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;

use super::bin::StorageBin;
use super::error::StorageError;
use super::types::{FileKey, FileStatus, ResolveMode};

const UPLOADING_DIR: &str = "uploading";
const STORED_DIR: &str = "stored";

/// A freshly created temp file in the 'uploading' bin. The caller streams
/// into `file` and must clean up via `FileStore::remove_uploaded_file` on
/// every exit path where the file was not promoted.
#[derive(Debug)]
pub struct UploadFile {
    pub path: PathBuf,
    pub file: fs::File,
}

/// The content-addressed file store.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

#[derive(Debug)]
struct FileStoreInner {
    base_path: PathBuf,
    uploading: StorageBin,
    stored: StorageBin,
}

impl FileStore {
    /// Create a store rooted at `base_path`. The bin directories are
    /// created lazily by the first upload.
    pub fn new(base_path: impl Into<PathBuf>, file_suffix: impl Into<String>) -> Self {
        let base_path = base_path.into();
        let file_suffix = file_suffix.into();
        Self {
            inner: Arc::new(FileStoreInner {
                uploading: StorageBin::new(&base_path, UPLOADING_DIR, true, file_suffix.clone()),
                stored: StorageBin::new(&base_path, STORED_DIR, false, file_suffix),
                base_path,
            }),
        }
    }

    /// Directory containing the 'uploading' and 'stored' bins.
    pub fn base_path(&self) -> &Path {
        &self.inner.base_path
    }

    /// Directory of the 'stored' bin.
    pub fn storage_path(&self) -> PathBuf {
        self.inner.base_path.join(STORED_DIR)
    }

    /// Check the status of a file key and return its actual path.
    ///
    /// The 'stored' bin takes priority; in `ResolveMode::StoredOnly` the
    /// 'uploading' bin is not consulted at all.
    pub async fn resolve_file(&self, key: &FileKey, mode: ResolveMode) -> FileStatus {
        let partial = key.partial_path();

        if let Some(path) = self.inner.stored.resolve(&partial).await {
            return FileStatus::Stored(path);
        }
        if mode == ResolveMode::Everything {
            if let Some(path) = self.inner.uploading.resolve(&partial).await {
                return FileStatus::Uploading(path);
            }
        }
        FileStatus::DoesNotExist
    }

    /// Open a temp file suitable to stream an upload to.
    pub async fn open_for_upload(&self, key: &FileKey) -> Result<UploadFile, StorageError> {
        let (path, file) = self.inner.uploading.open_for_writing(&key.partial_path()).await?;
        Ok(UploadFile { path, file })
    }

    /// Promote a fully received, verified file from 'uploading' to its
    /// canonical 'stored' path.
    ///
    /// Rejects paths outside the 'uploading' bin. When the destination
    /// already exists a concurrent uploader won the race; the source temp
    /// file is removed and the move reports success (idempotent promote).
    pub async fn move_to_stored(
        &self,
        key: &FileKey,
        uploaded_path: &Path,
    ) -> Result<(), StorageError> {
        let partial = key.partial_path();
        if !self.inner.uploading.contains(&partial, uploaded_path) {
            return Err(StorageError::NotInUploading(uploaded_path.to_path_buf()));
        }

        let target = self.inner.stored.path_for(&partial);
        if fs::metadata(&target).await.is_ok() {
            tracing::debug!(
                key = %key,
                path = %uploaded_path.display(),
                "file was already stored by a concurrent upload"
            );
            self.remove_uploaded_file(uploaded_path).await;
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(uploaded_path, &target).await?;
        Ok(())
    }

    /// Best-effort removal of an aborted upload's temp file. Errors are
    /// logged, not propagated.
    pub async fn remove_uploaded_file(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "unable to remove uploaded file"
                );
            }
        }
    }

    /// Remove a file from the 'stored' bin. Used by external garbage
    /// collection only.
    pub async fn remove_stored_file(&self, path: &Path) -> Result<(), StorageError> {
        if !self.inner.stored.contains("", path) {
            return Err(StorageError::NotInStored(path.to_path_buf()));
        }
        fs::remove_file(path).await?;
        Ok(())
    }
}
