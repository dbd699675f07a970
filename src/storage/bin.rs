//! Storage bins
//!
//! A bin is a directory-scoped namespace: pure path computation plus the
//! two filesystem primitives the file store needs (resolve and open for
//! writing). Bins know nothing about HTTP or checksums.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;
use uuid::Uuid;

use super::error::StorageError;

/// One directory-scoped namespace inside a file store.
///
/// Entries in a bin with a temp suffix are named `{filesize}-{random}`;
/// entries in other bins have the deterministic name `{filesize}`. Both
/// carry the bin's fixed `file_suffix` (usually empty).
#[derive(Debug, Clone)]
pub(crate) struct StorageBin {
    base_path: PathBuf,
    dir_name: String,
    has_temp_suffix: bool,
    file_suffix: String,
}

impl StorageBin {
    pub(crate) fn new(
        base_path: impl Into<PathBuf>,
        dir_name: impl Into<String>,
        has_temp_suffix: bool,
        file_suffix: impl Into<String>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            dir_name: dir_name.into(),
            has_temp_suffix,
            file_suffix: file_suffix.into(),
        }
    }

    /// Deterministic join of base path, bin name and partial path.
    /// Pure path computation, no filesystem access.
    pub(crate) fn storage_prefix(&self, partial_path: &str) -> PathBuf {
        let prefix = self.base_path.join(&self.dir_name);
        let partial = partial_path.trim_matches('/');
        if partial.is_empty() {
            prefix
        } else {
            prefix.join(partial)
        }
    }

    /// Whether `candidate` points inside this bin's storage for the given
    /// partial path. Pure string comparison; does not check the file is
    /// actually there. Rejects path-traversal-shaped inputs handed back
    /// from resolve operations.
    pub(crate) fn contains(&self, partial_path: &str, candidate: &Path) -> bool {
        let expected = self.storage_prefix(partial_path);
        let expected = expected.to_string_lossy();
        let candidate = candidate.to_string_lossy();
        candidate.len() > expected.len() && candidate.starts_with(expected.as_ref())
    }

    /// Canonical path of an entry. Only meaningful for bins without a temp
    /// suffix; temp-suffixed entries have a random component.
    pub(crate) fn path_for(&self, partial_path: &str) -> PathBuf {
        let mut path = self.storage_prefix(partial_path).into_os_string();
        path.push(&self.file_suffix);
        PathBuf::from(path)
    }

    /// Find the file for `partial_path` and return its path, or `None`
    /// when absent.
    ///
    /// Non-temp bins check the literal canonical path. Temp-suffixed bins
    /// scan the parent directory for `{name}-*{file_suffix}` entries; when
    /// several match (stale files left by a crash), the newest
    /// modification time wins.
    pub(crate) async fn resolve(&self, partial_path: &str) -> Option<PathBuf> {
        if !self.has_temp_suffix {
            let path = self.path_for(partial_path);
            return match fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => Some(path),
                _ => None,
            };
        }

        let prefix = self.storage_prefix(partial_path);
        let dir = prefix.parent()?.to_path_buf();
        let stem = format!("{}-", prefix.file_name()?.to_string_lossy());

        let mut entries = fs::read_dir(&dir).await.ok()?;
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(&stem) || !name.ends_with(&self.file_suffix) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map_or(true, |(t, _)| mtime >= *t) {
                newest = Some((mtime, entry.path()));
            }
        }
        newest.map(|(_, path)| path)
    }

    /// Create a uniquely named file for `partial_path`, creating parent
    /// directories as needed. Only legal on temp-suffixed bins.
    pub(crate) async fn open_for_writing(
        &self,
        partial_path: &str,
    ) -> Result<(PathBuf, fs::File), StorageError> {
        if !self.has_temp_suffix {
            return Err(StorageError::WriteNotAllowed);
        }

        let prefix = self.storage_prefix(partial_path);
        let dir = prefix.parent().ok_or(StorageError::WriteNotAllowed)?;
        fs::create_dir_all(dir).await?;

        let stem = prefix
            .file_name()
            .ok_or(StorageError::WriteNotAllowed)?
            .to_string_lossy()
            .into_owned();
        let name = format!("{}-{}{}", stem, Uuid::new_v4().simple(), self.file_suffix);
        let path = dir.join(name);

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok((path, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_storage_prefix() {
        let bin = StorageBin::new("/base", "testunit", false, "");
        assert_eq!(PathBuf::from("/base/testunit"), bin.storage_prefix(""));
        assert_eq!(PathBuf::from("/base/testunit"), bin.storage_prefix("/"));
        assert_eq!(PathBuf::from("/base/testunit/xxx"), bin.storage_prefix("xxx"));
        assert_eq!(PathBuf::from("/base/testunit/xxx"), bin.storage_prefix("/xxx"));
    }

    #[test]
    fn test_contains() {
        let bin = StorageBin::new("/base", "testunit", false, "");
        assert!(bin.contains("", Path::new("/base/testunit/jemoeder.txt")));
        assert!(bin.contains("jemoeder", Path::new("/base/testunit/jemoeder.txt")));
        assert!(!bin.contains("jemoeder", Path::new("/base/testunit/opjehoofd/jemoeder.txt")));
        assert!(!bin.contains("", Path::new("/etc/passwd")));
        assert!(!bin.contains("/", Path::new("/etc/passwd")));
        assert!(!bin.contains("/etc", Path::new("/etc/passwd")));
    }

    #[tokio::test]
    async fn test_resolve_non_temp() {
        let root = tempfile::tempdir().unwrap();
        let bin = StorageBin::new(root.path(), "stored", false, "");

        assert_eq!(None, bin.resolve("abcdef/123").await);

        let path = bin.path_for("abcdef/123");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, b"payload").await.unwrap();

        assert_eq!(Some(path), bin.resolve("abcdef/123").await);
    }

    #[tokio::test]
    async fn test_resolve_temp_suffixed() {
        let root = tempfile::tempdir().unwrap();
        let bin = StorageBin::new(root.path(), "uploading", true, "");

        assert_eq!(None, bin.resolve("abcdef/123").await);

        let (path, mut file) = bin.open_for_writing("abcdef/123").await.unwrap();
        file.write_all(b"partial").await.unwrap();
        drop(file);

        assert_eq!(Some(path.clone()), bin.resolve("abcdef/123").await);

        // A longer filesize with the same prefix must not match.
        assert_eq!(None, bin.resolve("abcdef/1234").await);

        // The random suffix keeps concurrent writers apart.
        let (other, _file) = bin.open_for_writing("abcdef/123").await.unwrap();
        assert_ne!(path, other);
    }

    #[tokio::test]
    async fn test_open_for_writing_requires_temp_suffix() {
        let root = tempfile::tempdir().unwrap();
        let bin = StorageBin::new(root.path(), "stored", false, "");

        let err = bin.open_for_writing("abcdef/123").await.unwrap_err();
        assert!(matches!(err, StorageError::WriteNotAllowed));
    }
}
