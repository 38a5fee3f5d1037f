//! Error types for the importer

use crate::store::AssetId;
use thiserror::Error;

/// Result type for run-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Run-level failures. Any of these aborts the current import run.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file missing, unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The feed could not be obtained or parsed
    #[error("Feed error: {0}")]
    Feed(String),

    /// The content store rejected an entity level operation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Failure reported by a content or entity store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("asset {0} not found")]
    AssetNotFound(AssetId),

    #[error("entity {0} not found")]
    EntityNotFound(String),

    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Failure to fetch a single remote resource
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

/// Per-item media failure. Collected and logged, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("An error occurred whilst importing {url}. The error was as follows: {source}")]
    FetchFailure {
        entity_ref: String,
        url: String,
        source: FetchError,
    },

    #[error("An error occurred whilst storing {url}. The error was as follows: {source}")]
    StoreFailure {
        entity_ref: String,
        url: String,
        source: StoreError,
    },

    #[error("Failed to delete {key} with asset ID {asset}: {source}")]
    DeleteFailure {
        entity_ref: String,
        key: &'static str,
        asset: AssetId,
        source: StoreError,
    },
}

impl MediaError {
    /// Reference of the entity the failure belongs to
    pub fn entity_ref(&self) -> &str {
        match self {
            MediaError::FetchFailure { entity_ref, .. }
            | MediaError::StoreFailure { entity_ref, .. }
            | MediaError::DeleteFailure { entity_ref, .. } => entity_ref,
        }
    }
}

/// Failure talking to the geocoding service
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Failed to reach Google Geocoding service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google Geocoding service returned status {0}")]
    Status(String),

    #[error("Failed to parse response from Google Geocoding service.")]
    Parse,
}
