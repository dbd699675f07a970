//! File store routes
//!
//! The upload/download/probe protocol on `/files/:digest/:filesize`:
//!
//! - OPTIONS: existence probe. 200 = stored, 208 = upload in flight,
//!   404 = absent.
//! - GET: download a stored file. In-flight uploads are never served.
//! - POST: upload. 204 = stored now, 208 = someone else has it (already
//!   stored, or in flight and the client sent the defer header),
//!   417 = declared size or checksum did not match the received bytes.

use std::path::Path as FilePath;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::fs;
use tokio_util::io::ReaderStream;

use crate::compression;
use crate::error::{AppError, Result};
use crate::hasher::{self, HashCopyError};
use crate::state::AppState;
use crate::storage::{FileKey, FileStatus, ResolveMode};

/// GET response header carrying the content digest.
pub const CHECKSUM_HEADER: &str = "X-Depot-Checksum";
/// POST request header with the client-side filename; log context only.
pub const ORIGINAL_FILENAME_HEADER: &str = "X-Depot-Original-Filename";
/// POST request header: "true" means the client would rather retry later
/// than wait out someone else's upload of the same content.
pub const CAN_DEFER_HEADER: &str = "X-Depot-Can-Defer-Upload";

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/:digest/:filesize",
        get(download_file)
            .options(check_file)
            .post(receive_file),
    )
}

/// Validate the path parameters into a file key. No filesystem access
/// happens before this passes.
fn parse_key(digest: String, filesize: &str) -> Result<FileKey> {
    let filesize: u64 = filesize
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid filesize: {filesize}")))?;
    FileKey::new(digest, filesize).map_err(|err| AppError::BadRequest(err.to_string()))
}

/// OPTIONS /files/:digest/:filesize
async fn check_file(
    State(state): State<AppState>,
    Path((digest, filesize)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = parse_key(digest, &filesize)?;
    tracing::info!(key = %key, "checking file");

    match state.file_store().resolve_file(&key, ResolveMode::Everything).await {
        FileStatus::Stored(_) => Ok(StatusCode::OK),
        FileStatus::Uploading(_) => Ok(StatusCode::ALREADY_REPORTED),
        FileStatus::DoesNotExist => Err(AppError::NotFound(format!("file {key} not in store"))),
    }
}

/// GET /files/:digest/:filesize
///
/// Only serves 'stored' files, so no reader ever observes a partial
/// write.
async fn download_file(
    State(state): State<AppState>,
    Path((digest, filesize)): Path<(String, String)>,
) -> Result<Response> {
    let key = parse_key(digest, &filesize)?;
    tracing::info!(key = %key, "serving file");

    let status = state.file_store().resolve_file(&key, ResolveMode::StoredOnly).await;
    let FileStatus::Stored(path) = status else {
        return Err(AppError::NotFound("file not found".to_string()));
    };

    let metadata = fs::metadata(&path).await.map_err(|err| {
        tracing::error!(path = %path.display(), error = %err, "unable to stat stored file");
        AppError::NotFound("file not found".to_string())
    })?;
    if metadata.len() != key.filesize() {
        // Stored files are immutable once promoted; this should never happen.
        tracing::error!(
            path = %path.display(),
            real_size = metadata.len(),
            expected_size = key.filesize(),
            "file size in storage is corrupt"
        );
        return Err(AppError::Internal("file size in storage is corrupt".to_string()));
    }

    let file = fs::File::open(&path).await.map_err(|err| {
        tracing::error!(path = %path.display(), error = %err, "unable to read stored file");
        AppError::NotFound("file not found".to_string())
    })?;

    // A mid-stream read failure surfaces as a broken body stream; the
    // connection is closed, no further error signalling is possible.
    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/binary")
        .header(header::CONTENT_LENGTH, key.filesize())
        .header(header::ETAG, format!("'{}-{}'", key.digest(), key.filesize()))
        .header(CHECKSUM_HEADER, key.digest())
        .body(body)
        .map_err(|err| AppError::Internal(err.to_string()))
}

/// Outcome of racing the body copy against the receive listener channel.
enum CopyOutcome {
    Finished(std::result::Result<(u64, String), HashCopyError>),
    Overtaken,
}

/// POST /files/:digest/:filesize
async fn receive_file(
    State(state): State<AppState>,
    Path((digest, filesize)): Path<(String, String)>,
    request: Request,
) -> Response {
    let key = match parse_key(digest, &filesize) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };

    let headers = request.headers();
    let original_filename = headers
        .get(ORIGINAL_FILENAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-not specified-")
        .to_owned();
    let can_defer = headers
        .get(CAN_DEFER_HEADER)
        .is_some_and(|value| value.as_bytes() == b"true");
    let content_encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let request_uri = request.uri().to_string();

    let mut body_reader =
        match compression::decompressed_reader(content_encoding.as_deref(), request.into_body()) {
            Ok(reader) => reader,
            Err(err) => return AppError::BadRequest(err.to_string()).into_response(),
        };

    match state.file_store().resolve_file(&key, ResolveMode::Everything).await {
        FileStatus::Stored(_) => {
            tracing::info!(key = %key, original_filename, "uploaded file already exists");
            return already_reported(&request_uri);
        }
        FileStatus::Uploading(_) if can_defer => {
            tracing::info!(
                key = %key,
                original_filename,
                "someone is uploading this file and client can defer"
            );
            return (
                StatusCode::ALREADY_REPORTED,
                "File being uploaded, please defer\n",
            )
                .into_response();
        }
        _ => {}
    }

    tracing::info!(key = %key, original_filename, "receiving file");

    let mut upload = match state.file_store().open_for_upload(&key).await {
        Ok(upload) => upload,
        Err(err) => {
            tracing::error!(key = %key, error = %err, "unable to open file for writing uploaded data");
            return AppError::Internal("unable to open file".to_string()).into_response();
        }
    };

    // Registering before the copy starts: if another handler finishes
    // this key first, its signal aborts our body read mid-stream.
    let channel = state.receive_registry().acquire(&key).await;

    let outcome = {
        let copy = hasher::hashing_copy(&mut body_reader, &mut upload.file);
        tokio::pin!(copy);
        tokio::select! {
            result = &mut copy => CopyOutcome::Finished(result),
            () = channel.wait() => CopyOutcome::Overtaken,
        }
    };

    let response = finish_upload(&state, &key, &upload.path, &request_uri, outcome).await;

    // Every exit path: drop the temp file if it was not promoted, and
    // release any waiters for this key.
    drop(upload.file);
    state.file_store().remove_uploaded_file(&upload.path).await;
    state.receive_registry().signal_and_remove(&key).await;

    response
}

/// Steps 6-8 of the upload protocol: map the copy outcome, enforce the
/// size and checksum gates, promote to 'stored'.
async fn finish_upload(
    state: &AppState,
    key: &FileKey,
    temp_path: &FilePath,
    request_uri: &str,
    outcome: CopyOutcome,
) -> Response {
    let (written, actual_digest) = match outcome {
        CopyOutcome::Overtaken => {
            tracing::info!(key = %key, "file was completed during someone else's upload");
            return already_reported(request_uri);
        }
        CopyOutcome::Finished(Err(err @ HashCopyError::Read { .. })) => {
            // The client's stream broke; there is nobody left to read a
            // response, so only log.
            tracing::info!(
                key = %key,
                written = err.bytes_written(),
                error = %err,
                "upload truncated, client probably disconnected"
            );
            return AppError::Internal("upload interrupted".to_string()).into_response();
        }
        CopyOutcome::Finished(Err(err)) => {
            tracing::warn!(
                key = %key,
                written = err.bytes_written(),
                error = %err,
                "unable to copy request body to file"
            );
            return AppError::Internal("I/O error".to_string()).into_response();
        }
        CopyOutcome::Finished(Ok(result)) => result,
    };

    if written != key.filesize() {
        tracing::warn!(
            key = %key,
            declared_size = key.filesize(),
            actual_size = written,
            "mismatch between declared and actual size"
        );
        return (
            StatusCode::EXPECTATION_FAILED,
            format!("Received {written} bytes but you promised {}\n", key.filesize()),
        )
            .into_response();
    }

    if actual_digest != key.digest() {
        tracing::warn!(
            key = %key,
            actual_digest,
            "mismatch between declared and actual checksum"
        );
        return (
            StatusCode::EXPECTATION_FAILED,
            "Declared and actual checksums differ\n",
        )
            .into_response();
    }

    tracing::debug!(
        key = %key,
        received_bytes = written,
        temp_file = %temp_path.display(),
        "file received"
    );

    if let Err(err) = state.file_store().move_to_stored(key, temp_path).await {
        tracing::error!(
            key = %key,
            temp_file = %temp_path.display(),
            error = %err,
            "unable to move file from 'uploading' to 'stored' storage"
        );
        return AppError::Internal("unable to move file to 'stored' storage".to_string())
            .into_response();
    }

    StatusCode::NO_CONTENT.into_response()
}

/// 208 with a Location echoing the request URI: idempotent success signal
/// for retrying clients.
fn already_reported(request_uri: &str) -> Response {
    (
        StatusCode::ALREADY_REPORTED,
        [(header::LOCATION, request_uri.to_string())],
        "File already stored\n",
    )
        .into_response()
}
