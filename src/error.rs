// src/error.rs
// =============================================================================
// Typed errors for the cleaner, the crawler and the browser drivers.
//
// The command layer in main.rs still works with anyhow::Result; these types
// convert into anyhow::Error automatically through the ? operator.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    /// The directory to scan does not exist
    #[error("directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// A URL could not be parsed
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A URL parsed fine but has no host to restrict the crawl to
    #[error("URL has no host: {0}")]
    NoHost(String),

    #[error("could not read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The browser (or HTTP client) failed
    #[error("driver error: {0}")]
    Driver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn driver(err: impl ToString) -> Self {
        Self::Driver(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
