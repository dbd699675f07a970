//! Storage error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors from storage bin and file store operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Only temp-suffixed bins may be written to directly.
    #[error("writing is only allowed in storage bins with a temp suffix")]
    WriteNotAllowed,

    /// A path handed to `move_to_stored` did not point into the
    /// 'uploading' bin. Programming error or path-traversal attempt.
    #[error("file not inside the 'uploading' storage bin: {}", .0.display())]
    NotInUploading(PathBuf),

    /// A path handed to `remove_stored_file` did not point into the
    /// 'stored' bin.
    #[error("file not inside the 'stored' storage bin: {}", .0.display())]
    NotInStored(PathBuf),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
