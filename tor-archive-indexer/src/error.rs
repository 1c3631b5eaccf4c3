use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("an I/O error occurred: {0}")]
    GenericIo(#[from] std::io::Error),

    #[error("http client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("deserialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request for {url} failed after {attempts} attempts: {source}")]
    Network {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to extract archive {}: {}", .0.display(), .1)]
    Extract(PathBuf, #[source] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache document already exists: {}", .0.display())]
    CacheConflict(PathBuf),

    #[error("required catalog document missing: {}", .0.display())]
    MissingCatalog(PathBuf),
}
