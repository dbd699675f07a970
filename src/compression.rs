//! Request body decompression
//!
//! Upload bodies may be gzip-compressed, negotiated via the
//! `Content-Encoding` header. The decoder streams; the body is never
//! buffered whole.

use async_compression::tokio::bufread::GzipDecoder;
use axum::body::Body;
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// The request declared a `Content-Encoding` this store cannot decode.
#[derive(Debug, thiserror::Error)]
#[error("Content-Encoding not supported: {0}")]
pub struct UnsupportedEncoding(pub String);

/// Wrap a request body in a reader that yields the decompressed bytes.
/// `identity` (or no header) passes the body through untouched.
pub fn decompressed_reader(
    content_encoding: Option<&str>,
    body: Body,
) -> Result<Box<dyn AsyncRead + Send + Unpin>, UnsupportedEncoding> {
    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);

    match content_encoding.unwrap_or("") {
        "" | "identity" => Ok(Box::new(reader)),
        "gzip" => Ok(Box::new(GzipDecoder::new(reader))),
        other => Err(UnsupportedEncoding(other.to_string())),
    }
}
