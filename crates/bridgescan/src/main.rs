//! bridgescan - Tor bridge list analyzer

use anyhow::{Context, Result};
use bridgescan::{Analyzer, AnalyzerConfig};
use bridgescan_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bridgescan")]
#[command(author, version, about = "Analyze Tor bridge lists by ASN and country")]
struct Cli {
    /// Directory holding the bridge lists
    #[arg(long, env = "BRIDGES_DIR")]
    bridges_dir: Option<PathBuf>,

    /// Directory holding the GeoLite2 databases
    #[arg(long, env = "MMDB_DIR")]
    mmdb_dir: Option<PathBuf>,

    /// Directory the JSON results are written to
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Concurrent enrichment batches
    #[arg(long)]
    max_workers: Option<usize>,

    /// Addresses per enrichment batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Use files already on disk, do not download
    #[arg(long)]
    skip_download: bool,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, mut config: AnalyzerConfig) -> AnalyzerConfig {
        if let Some(dir) = self.bridges_dir {
            config.bridges_dir = dir;
        }
        if let Some(dir) = self.mmdb_dir {
            config.mmdb_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(n) = self.max_workers {
            config.max_workers = n;
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        config.download = !self.skip_download;
        config.show_progress = !self.no_progress && std::io::stderr().is_terminal();
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Both)
        .log_file_prefix("bridgescan")
        .build()
        .merge_env()
        .context("Invalid logging configuration")?;

    let _guard = init_logging(&log_config)?;

    let config = AnalyzerConfig::from_env().context("Invalid configuration")?;
    let config = cli.apply(config);
    config.validate().context("Invalid configuration")?;

    let summary = Analyzer::new(config).run().await.context("Analysis failed")?;

    info!(
        total = summary.total,
        china = summary.china,
        organizations = summary.organizations,
        "Done"
    );
    Ok(())
}
