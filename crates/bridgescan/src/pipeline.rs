//! End-to-end analyzer run
//!
//! directories -> downloads -> extraction -> discovery -> load -> enrich
//! -> join -> partition -> JSON files -> summary

use bridgescan_common::{BridgeError, Result};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::config::AnalyzerConfig;
use crate::discovery::{discover_bridge_files, ensure_directories, find_database, DatabaseKind};
use crate::download::Downloader;
use crate::enrich::{join_records, Enricher};
use crate::extract::extract_archives;
use crate::geoip::{MmdbSource, ReaderSource};
use crate::loader::{BridgeSource, FileLoader};
use crate::models::EnrichedRecord;
use crate::output::{save_json, sort_records};
use crate::parser::CacheStats;
use crate::partition::{filter_country, filter_organizations, CHINA_COUNTRY_CODE, TARGET_ORGANIZATIONS};

/// Records produced by one analysis, each list sorted for output
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub all: Vec<EnrichedRecord>,
    pub china: Vec<EnrichedRecord>,
    pub organizations: Vec<EnrichedRecord>,
    /// Addresses that received an `AddressInfo`
    pub enriched_addresses: usize,
    /// Loaded records left out because their batch failed
    pub dropped: usize,
    pub cache: CacheStats,
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub china: usize,
    pub organizations: usize,
    /// Unique addresses with lookup results
    pub enriched_addresses: usize,
    pub cache_hits: usize,
    pub dropped: usize,
}

impl From<&Analysis> for RunSummary {
    fn from(analysis: &Analysis) -> Self {
        Self {
            total: analysis.all.len(),
            china: analysis.china.len(),
            organizations: analysis.organizations.len(),
            enriched_addresses: analysis.enriched_addresses,
            cache_hits: analysis.cache.hits,
            dropped: analysis.dropped,
        }
    }
}

pub struct Analyzer {
    config: AnalyzerConfig,
    reader_source: Option<Arc<dyn ReaderSource>>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            reader_source: None,
        }
    }

    /// Use `source` instead of the MMDB files found in `mmdb_dir`
    pub fn with_reader_source(mut self, source: Arc<dyn ReaderSource>) -> Self {
        self.reader_source = Some(source);
        self
    }

    /// Run every stage and write the three result files
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<RunSummary> {
        info!("Starting Tor Bridge Analyzer");
        let config = &self.config;

        ensure_directories(&[&config.mmdb_dir, &config.bridges_dir, &config.output_dir])?;

        if config.download {
            self.download().await;
        } else {
            info!("Skipping downloads");
        }

        self.extract().await;

        let sources = discover_bridge_files(&config.bridges_dir);
        let analysis = self.analyze(&sources).await?;

        save_json(&config.all_output(), &analysis.all)?;
        save_json(&config.china_output(), &analysis.china)?;
        save_json(&config.organization_output(), &analysis.organizations)?;

        let summary = RunSummary::from(&analysis);
        info!("Analysis completed!");
        info!("Total bridges: {}", summary.total);
        info!("China bridges: {}", summary.china);
        info!("Specific org bridges: {}", summary.organizations);
        info!("Unique addresses enriched: {}", summary.enriched_addresses);
        info!(
            hits = analysis.cache.hits,
            misses = analysis.cache.misses,
            entries = analysis.cache.entries,
            "Parse cache"
        );
        if summary.dropped > 0 {
            warn!("{} records dropped by failed batches", summary.dropped);
        }

        Ok(summary)
    }

    /// Load, enrich, join and partition `sources`
    ///
    /// Fails with [`BridgeError::NoBridgeData`] when nothing could be loaded
    /// and [`BridgeError::NoDatabases`] when neither database is available.
    pub async fn analyze(&self, sources: &[BridgeSource]) -> Result<Analysis> {
        let loader = FileLoader::new().with_progress(self.config.show_progress);
        let records = loader.load_all(sources).await;

        if records.is_empty() {
            warn!("No bridge data found");
            return Err(BridgeError::NoBridgeData);
        }

        let source = self.resolve_reader_source()?;

        info!("Starting bridge analysis...");
        let enricher = Enricher::new(source)
            .with_max_workers(self.config.max_workers)
            .with_batch_size(self.config.batch_size)
            .with_progress(self.config.show_progress);

        let enriched = enricher.enrich(&records).await;
        let released = enricher.close();
        info!(workers = released, "Released MMDB readers");

        let mut all = join_records(&records, &enriched);
        let dropped = records.len() - all.len();
        sort_records(&mut all);

        let china = filter_country(&all, CHINA_COUNTRY_CODE);
        info!("Found {} bridges in China", china.len());

        let organizations = filter_organizations(&all, &TARGET_ORGANIZATIONS);
        info!("Found {} bridges from specific organizations", organizations.len());

        Ok(Analysis {
            all,
            china,
            organizations,
            enriched_addresses: enriched.len(),
            dropped,
            cache: loader.cache_stats(),
        })
    }

    fn resolve_reader_source(&self) -> Result<Arc<dyn ReaderSource>> {
        if let Some(source) = &self.reader_source {
            return Ok(Arc::clone(source));
        }

        let asn = find_database(&self.config.mmdb_dir, DatabaseKind::Asn);
        let country = find_database(&self.config.mmdb_dir, DatabaseKind::Country);

        if asn.is_none() {
            warn!("ASN database file not found, will skip ASN info lookup");
        }
        if country.is_none() {
            warn!("Country database file not found, will skip country info lookup");
        }

        let source = MmdbSource::new(asn, country);
        if !source.has_any() {
            error!("No MMDB database files found!");
            return Err(BridgeError::NoDatabases);
        }
        Ok(Arc::new(source))
    }

    async fn download(&self) {
        let downloader = match Downloader::new(self.config.proxy()) {
            Ok(d) => d.with_progress(self.config.show_progress),
            Err(e) => {
                error!(error = %e, "Unable to create HTTP client, skipping downloads");
                return;
            },
        };

        info!("Downloading MMDB files...");
        let databases = downloader.download_databases(&self.config.mmdb_dir).await;
        info!(
            downloaded = databases.downloaded,
            skipped = databases.skipped,
            failed = databases.failed,
            "MMDB download step finished"
        );

        info!("Downloading Bridges files...");
        let bridges = downloader.download_bridges(&self.config.bridges_dir).await;
        info!(
            downloaded = bridges.downloaded,
            skipped = bridges.skipped,
            failed = bridges.failed,
            "Bridges download step finished"
        );
    }

    /// Unpack downloaded archives; failures are logged, never fatal
    async fn extract(&self) {
        let bridges_dir = self.config.bridges_dir.clone();
        match tokio::task::spawn_blocking(move || extract_archives(&bridges_dir)).await {
            Ok(summary) => info!(
                extracted = summary.extracted,
                skipped = summary.skipped,
                failed = summary.failed,
                "Archive extraction step finished"
            ),
            Err(e) => error!(error = %e, "Archive extraction task failed"),
        }
    }
}
