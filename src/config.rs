//! Server configuration
//!
//! Loaded from environment variables (optionally via a `.env` file).

use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
}

/// File store settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base directory containing the 'uploading' and 'stored' bins
    pub path: PathBuf,

    /// Fixed extension appended to every entry in both bins (usually empty)
    pub file_suffix: String,

    /// Shared bearer token; when unset the store accepts all requests
    pub auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: 8084 },
            storage: StorageConfig {
                path: PathBuf::from("./depot-file-store"),
                file_suffix: String::new(),
                auth_token: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, std::num::ParseIntError> {
        let defaults = Config::default();

        let port = match std::env::var("DEPOT_PORT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.server.port,
        };

        let path = std::env::var("DEPOT_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.path);

        let file_suffix =
            std::env::var("DEPOT_FILE_SUFFIX").unwrap_or(defaults.storage.file_suffix);

        let auth_token = std::env::var("DEPOT_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Self {
            server: ServerConfig { port },
            storage: StorageConfig {
                path,
                file_suffix,
                auth_token,
            },
        })
    }
}
