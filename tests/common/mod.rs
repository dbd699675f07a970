//! Common test utilities

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::{middleware, Router};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;

use depot_server::auth;
use depot_server::config::Config;
use depot_server::routes;
use depot_server::state::AppState;
use depot_server::storage::{FileKey, FileStore};

/// A file store router on a throwaway temp directory.
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
    _store_dir: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config_tweak(|_| {})
    }

    pub fn with_config_tweak(tweak: impl FnOnce(&mut Config)) -> Self {
        let store_dir = tempfile::tempdir().expect("failed to create temp store dir");
        let mut config = Config::default();
        config.storage.path = store_dir.path().to_path_buf();
        tweak(&mut config);

        let state = AppState::new(config);
        let router = Router::new()
            .nest(
                "/files",
                routes::files::router().route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::require_auth,
                )),
            )
            .with_state(state.clone());

        Self {
            router,
            state,
            _store_dir: store_dir,
        }
    }

    pub fn file_store(&self) -> &FileStore {
        self.state.file_store()
    }

    /// Put a payload straight into the 'stored' bin through the store's
    /// own upload lifecycle.
    pub async fn store_payload(&self, key: &FileKey, payload: &[u8]) {
        let mut upload = self.file_store().open_for_upload(key).await.unwrap();
        upload.file.write_all(payload).await.unwrap();
        upload.file.flush().await.unwrap();
        self.file_store().move_to_stored(key, &upload.path).await.unwrap();
    }
}

/// Gzip-compress a payload for upload bodies.
pub async fn gzip(payload: &[u8]) -> Vec<u8> {
    use async_compression::tokio::write::GzipEncoder;

    let mut encoder = GzipEncoder::new(Vec::new());
    encoder.write_all(payload).await.unwrap();
    encoder.shutdown().await.unwrap();
    encoder.into_inner()
}

/// Send one request through the router and collect the response.
pub async fn send_request(
    router: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Body,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(body).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

pub fn files_uri(key: &FileKey) -> String {
    format!("/files/{}/{}", key.digest(), key.filesize())
}
