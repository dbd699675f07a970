//! Storage module for the content-addressed file store
//!
//! A store is one base directory with two bins: 'uploading' holds
//! temp-suffixed files that are still being received, 'stored' holds
//! verified files under their canonical `{digest}/{filesize}` path.

mod bin;
mod error;
mod file_store;
mod types;

pub use error::StorageError;
pub use file_store::{FileStore, UploadFile};
pub use types::{FileKey, FileStatus, InvalidDigest, ResolveMode, MIN_DIGEST_LENGTH};
