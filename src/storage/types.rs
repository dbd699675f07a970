//! Core types shared across the storage module

use std::fmt;
use std::path::PathBuf;

/// Minimum accepted digest length. Arbitrary floor, but every hashing
/// method in use produces at least 32 hex characters.
pub const MIN_DIGEST_LENGTH: usize = 32;

/// Identity of a file in the store: its content digest plus its declared
/// size in bytes. Two uploads sharing a key are assumed to carry identical
/// content once checksum verification has passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    digest: String,
    filesize: u64,
}

impl FileKey {
    /// Create a key, rejecting suspiciously short digests.
    pub fn new(digest: impl Into<String>, filesize: u64) -> Result<Self, InvalidDigest> {
        let digest = digest.into();
        if digest.len() < MIN_DIGEST_LENGTH {
            return Err(InvalidDigest {
                length: digest.len(),
            });
        }
        Ok(Self { digest, filesize })
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn filesize(&self) -> u64 {
        self.filesize
    }

    /// Path of this key relative to a storage bin.
    pub fn partial_path(&self) -> String {
        format!("{}/{}", self.digest, self.filesize)
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.digest, self.filesize)
    }
}

/// Digest failed the minimum-length check.
#[derive(Debug, thiserror::Error)]
#[error("digest suspiciously short ({length} characters, minimum {MIN_DIGEST_LENGTH})")]
pub struct InvalidDigest {
    pub length: usize,
}

/// Status of a file key in the store, with the resolved path when the file
/// is present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    DoesNotExist,
    Uploading(PathBuf),
    Stored(PathBuf),
}

impl FileStatus {
    pub fn is_stored(&self) -> bool {
        matches!(self, FileStatus::Stored(_))
    }
}

/// Whether `FileStore::resolve_file` consults only the 'stored' bin or
/// also the 'uploading' bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    StoredOnly,
    Everything,
}
