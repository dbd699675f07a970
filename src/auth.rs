//! Authentication middleware
//!
//! The file server does not implement credential management itself; it
//! consumes an injected `Authenticator` that either admits a request or
//! answers 401 before any handler runs.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Decides whether a request may reach the file server.
pub trait Authenticator: Send + Sync + 'static {
    /// `false` means the request is answered with 401 unauthenticated.
    fn authenticate(&self, headers: &HeaderMap) -> bool;
}

/// Admits every request. Used when no auth token is configured.
#[derive(Debug, Clone, Copy)]
pub struct OpenAccess;

impl Authenticator for OpenAccess {
    fn authenticate(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

/// Requires `Authorization: Bearer {token}` with a shared token.
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    token: String,
}

impl TokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return false;
        };
        let Ok(value) = value.to_str() else {
            return false;
        };
        match value.strip_prefix("Bearer ") {
            Some(presented) => presented == self.token,
            None => false,
        }
    }
}

/// Middleware wrapping the file server routes with auth-or-401 semantics.
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.authenticator().authenticate(request.headers()) {
        next.run(request).await
    } else {
        tracing::info!(uri = %request.uri(), "rejecting unauthenticated request");
        StatusCode::UNAUTHORIZED.into_response()
    }
}
