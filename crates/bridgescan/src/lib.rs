//! bridgescan library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Analyzes published Tor bridge lists: extracts bridge addresses from each
//! list format, enriches every unique address with ASN and country data from
//! local MaxMind databases, and writes the full result plus two subsets
//! (bridges in China, bridges hosted by selected cloud providers) as JSON.
//!
//! # Stages
//!
//! - [`extract`]: unpacking the archived snowflake lists
//! - [`parser`]: per-format line grammar with a run-scoped memo table
//! - [`loader`]: concurrent file loading
//! - [`geoip`]: MMDB readers and the per-worker reader pool
//! - [`enrich`]: batched concurrent lookups and the record join
//! - [`partition`]: China and organization subsets
//! - [`pipeline`]: the end-to-end [`Analyzer`]
//!
//! # Example
//!
//! ```no_run
//! use bridgescan::{Analyzer, AnalyzerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AnalyzerConfig::from_env()?;
//!     let summary = Analyzer::new(config).run().await?;
//!     println!("{} bridges analyzed", summary.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod download;
pub mod enrich;
pub mod extract;
pub mod geoip;
pub mod loader;
pub mod models;
pub mod output;
pub mod parser;
pub mod partition;
pub mod pipeline;
pub mod progress;

pub use config::AnalyzerConfig;
pub use models::{AddressInfo, BridgeRecord, BridgeType, EnrichedRecord};
pub use pipeline::{Analysis, Analyzer, RunSummary};
