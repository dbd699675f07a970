//! Single-pass streaming checksum computation
//!
//! Copies bytes from a reader to a writer while feeding a SHA-256 hasher
//! in the same pass, so an upload is written to disk and verified without
//! reading it twice.

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A copy that failed partway. Carries the number of bytes that made it
/// to the writer so the caller can log precisely, and distinguishes the
/// failing side: a read error is the client's stream, a write error is
/// local storage.
#[derive(Debug, thiserror::Error)]
pub enum HashCopyError {
    #[error("read failed after {written} bytes: {source}")]
    Read {
        written: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("write failed after {written} bytes: {source}")]
    Write {
        written: u64,
        #[source]
        source: std::io::Error,
    },
}

impl HashCopyError {
    pub fn bytes_written(&self) -> u64 {
        match self {
            HashCopyError::Read { written, .. } | HashCopyError::Write { written, .. } => *written,
        }
    }
}

/// SHA-256 of an in-memory payload, as lowercase hex.
pub fn checksum(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Copy all bytes from `reader` to `writer`, returning the byte count and
/// the hex digest of everything copied. Deterministic: the same bytes
/// always produce the same digest.
pub async fn hashing_copy<R, W>(reader: &mut R, writer: &mut W) -> Result<(u64, String), HashCopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut written: u64 = 0;

    loop {
        let count = reader
            .read(&mut buffer)
            .await
            .map_err(|source| HashCopyError::Read { written, source })?;
        if count == 0 {
            break;
        }

        hasher.update(&buffer[..count]);
        writer
            .write_all(&buffer[..count])
            .await
            .map_err(|source| HashCopyError::Write { written, source })?;
        written += count as u64;
    }

    writer
        .flush()
        .await
        .map_err(|source| HashCopyError::Write { written, source })?;

    Ok((written, hex::encode(hasher.finalize())))
}
