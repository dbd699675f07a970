//! Application state management

use std::sync::Arc;

use crate::auth::{Authenticator, OpenAccess, TokenAuthenticator};
use crate::config::Config;
use crate::storage::FileStore;
use crate::upload::ReceiveListenerRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    file_store: FileStore,
    receive_registry: ReceiveListenerRegistry,
    authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Create the application state. The authenticator is derived from
    /// the config: shared-token auth when a token is set, open access
    /// otherwise.
    pub fn new(config: Config) -> Self {
        let authenticator: Arc<dyn Authenticator> = match &config.storage.auth_token {
            Some(token) => Arc::new(TokenAuthenticator::new(token.clone())),
            None => Arc::new(OpenAccess),
        };
        Self::with_authenticator(config, authenticator)
    }

    /// Create the application state with an externally provided
    /// authenticator.
    pub fn with_authenticator(config: Config, authenticator: Arc<dyn Authenticator>) -> Self {
        let file_store = FileStore::new(
            config.storage.path.clone(),
            config.storage.file_suffix.clone(),
        );
        Self {
            inner: Arc::new(AppStateInner {
                config,
                file_store,
                receive_registry: ReceiveListenerRegistry::new(),
                authenticator,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the file store
    pub fn file_store(&self) -> &FileStore {
        &self.inner.file_store
    }

    /// Get the receive listener registry
    pub fn receive_registry(&self) -> &ReceiveListenerRegistry {
        &self.inner.receive_registry
    }

    /// Get the authenticator
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.inner.authenticator.as_ref()
    }
}
