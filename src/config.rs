use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub data_dir: String,
    pub storage: StorageConfig,
    /// Full-text search backend; absent disables indexing entirely.
    pub search: Option<SearchConfig>,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for the local blob store backend
    pub root: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch-compatible engine
    pub url: String,
    /// Index name holding the document projections
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-call timeout; indexing calls swallow the error on expiry
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./blobs".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let storage_root =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./blobs".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let search = std::env::var("SEARCH_URL").ok().map(|url| SearchConfig {
            url,
            index: std::env::var("SEARCH_INDEX").unwrap_or_else(|_| "docs".to_string()),
            username: std::env::var("SEARCH_USERNAME").ok(),
            password: std::env::var("SEARCH_PASSWORD").ok(),
            timeout_ms: std::env::var("SEARCH_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2000),
        });

        let config = Config {
            bind_address,
            data_dir,
            storage: StorageConfig { root: storage_root },
            search,
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if let Some(ref search) = self.search {
            if !search.url.starts_with("http://") && !search.url.starts_with("https://") {
                return Err(ConfigError::ValidationError(
                    "SEARCH_URL must be an http(s) URL".to_string(),
                ));
            }
            if search.index.is_empty() {
                return Err(ConfigError::ValidationError(
                    "SEARCH_INDEX cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
