//! Error types for bridgescan

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bridgescan operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for bridgescan
///
/// Most variants are recovered close to where they occur (a file that cannot
/// be read contributes no records, a database that cannot be opened leaves its
/// fields empty). Only [`BridgeError::NoBridgeData`] and
/// [`BridgeError::NoDatabases`] stop a run.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open database {path}: {message}")]
    DatabaseOpen { path: PathBuf, message: String },

    #[error("Failed to extract {path}: {message}")]
    Extract { path: PathBuf, message: String },

    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Batch {batch} failed: {message}")]
    BatchFailed { batch: usize, message: String },

    #[error("No bridge data found")]
    NoBridgeData,

    #[error("No MMDB database files found")]
    NoDatabases,
}

impl BridgeError {
    /// Create a file access error
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an archive extraction error
    pub fn extract(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Extract {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_access_message_names_path() {
        let err = BridgeError::file_access(
            "Bridges/obfs4.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("Bridges/obfs4.txt"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_batch_failed_message() {
        let err = BridgeError::BatchFailed {
            batch: 3,
            message: "task panicked".to_string(),
        };
        assert_eq!(err.to_string(), "Batch 3 failed: task panicked");
    }

    #[test]
    fn test_extract_message() {
        let err = BridgeError::extract("Bridges/snowflake-ipv4.rar", "bad header");
        assert_eq!(err.to_string(), "Failed to extract Bridges/snowflake-ipv4.rar: bad header");
    }
}
