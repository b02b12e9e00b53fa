//! Run configuration
//!
//! Values come from the process environment (a `.env` file is honored) and
//! can be overridden per run from the command line.

use bridgescan_common::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::enrich::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_WORKERS};

/// Settings for one analyzer run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Concurrent enrichment batches
    pub max_workers: usize,
    /// Addresses per enrichment batch
    pub batch_size: usize,
    /// Route downloads through `proxy_url`
    pub use_proxy: bool,
    pub proxy_url: String,
    pub bridges_dir: PathBuf,
    pub mmdb_dir: PathBuf,
    /// Where the three JSON files are written
    pub output_dir: PathBuf,
    /// Fetch missing databases and bridge lists before the run
    pub download: bool,
    pub show_progress: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            use_proxy: false,
            proxy_url: String::new(),
            bridges_dir: PathBuf::from("Bridges"),
            mmdb_dir: PathBuf::from("MMDB"),
            output_dir: PathBuf::from("."),
            download: true,
            show_progress: true,
        }
    }
}

impl AnalyzerConfig {
    /// Load from `.env` and the environment, then validate
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            max_workers: parse_var("MAX_WORKERS")?.unwrap_or(defaults.max_workers),
            batch_size: parse_var("BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            use_proxy: std::env::var("USE_PROXY")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            proxy_url: std::env::var("PROXY_URL").unwrap_or_default(),
            bridges_dir: std::env::var("BRIDGES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.bridges_dir),
            mmdb_dir: std::env::var("MMDB_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.mmdb_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    ///
    /// A proxy switched on without a URL is not an error: downloads fall
    /// back to a direct connection.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(BridgeError::config("MAX_WORKERS must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(BridgeError::config("BATCH_SIZE must be greater than 0"));
        }
        if self.use_proxy && self.proxy_url.trim().is_empty() {
            warn!("USE_PROXY is set but PROXY_URL is empty, connecting directly");
        }
        Ok(())
    }

    /// Proxy endpoint to use, if any
    pub fn proxy(&self) -> Option<&str> {
        let url = self.proxy_url.trim();
        (self.use_proxy && !url.is_empty()).then_some(url)
    }

    pub fn all_output(&self) -> PathBuf {
        self.output_dir.join("all_tor_bridges.json")
    }

    pub fn china_output(&self) -> PathBuf {
        self.output_dir.join("china_tor_bridges.json")
    }

    pub fn organization_output(&self) -> PathBuf {
        self.output_dir.join("specific_org_tor_bridges.json")
    }
}

/// `Ok(None)` when unset, an error when set but not a number
fn parse_var(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BridgeError::config(format!("{name} must be a non-negative integer, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}
