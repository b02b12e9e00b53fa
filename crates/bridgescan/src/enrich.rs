//! Address enrichment
//!
//! Deduplicates the loaded addresses, splits them into fixed-size batches and
//! runs the batches on a bounded pool of blocking tasks. Every task leases
//! its own reader context from the [`ReaderPool`], so lookups never contend
//! on a shared handle.
//!
//! Results are merged in completion order. Each address belongs to exactly
//! one batch, so the merged map does not depend on which batch finishes
//! first or on the worker count.

use bridgescan_common::BridgeError;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::geoip::{AsnLookup, CountryLookup, ReaderPool, ReaderSource, WorkerReaders};
use crate::models::{AddressInfo, BridgeRecord, EnrichedRecord};
use crate::progress::create_progress_bar;

/// Addresses per enrichment batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Concurrent enrichment batches
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Runs batch lookups against a [`ReaderPool`]
pub struct Enricher {
    pool: Arc<ReaderPool>,
    max_workers: usize,
    batch_size: usize,
    show_progress: bool,
}

impl Enricher {
    pub fn new(source: Arc<dyn ReaderSource>) -> Self {
        Self {
            pool: Arc::new(ReaderPool::new(source)),
            max_workers: DEFAULT_MAX_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }

    /// Set concurrency level (minimum 1)
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Set batch size (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn pool(&self) -> &Arc<ReaderPool> {
        &self.pool
    }

    /// Look up every distinct address in `records`
    ///
    /// Addresses of a batch whose task failed are missing from the result.
    #[instrument(skip_all, fields(records = records.len(), workers = self.max_workers))]
    pub async fn enrich(&self, records: &[BridgeRecord]) -> HashMap<IpAddr, AddressInfo> {
        let addresses = unique_addresses(records);
        let batches: Vec<Vec<IpAddr>> = addresses
            .chunks(self.batch_size)
            .map(<[IpAddr]>::to_vec)
            .collect();

        info!(
            "Enriching {} unique addresses in {} batches (batch_size={}, workers={})",
            addresses.len(),
            batches.len(),
            self.batch_size,
            self.max_workers
        );

        let pb = create_progress_bar(addresses.len() as u64, "Analyzing bridges", self.show_progress);

        let mut completed = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| {
                let pool = Arc::clone(&self.pool);
                async move {
                    let size = batch.len();
                    let joined = tokio::task::spawn_blocking(move || {
                        let mut lease = pool.checkout();
                        lookup_batch(&mut lease, &batch)
                    })
                    .await;
                    (index, size, joined)
                }
            })
            .buffer_unordered(self.max_workers);

        let mut enriched = HashMap::with_capacity(addresses.len());

        while let Some((index, size, joined)) = completed.next().await {
            match joined {
                Ok(infos) => {
                    debug!(batch = index, addresses = size, "Batch complete");
                    for info in infos {
                        enriched.insert(info.address, info);
                    }
                },
                Err(e) => {
                    let err = BridgeError::BatchFailed {
                        batch: index,
                        message: e.to_string(),
                    };
                    error!(batch = index, addresses = size, error = %err, "Batch processing failed");
                },
            }
            pb.inc(size as u64);
        }

        pb.finish_and_clear();

        info!(
            "Completed analysis of {} / {} addresses",
            enriched.len(),
            addresses.len()
        );

        enriched
    }

    /// Release all reader contexts; call once enrichment has finished
    pub fn close(&self) -> usize {
        self.pool.close()
    }
}

/// Distinct addresses in order of first occurrence
pub fn unique_addresses(records: &[BridgeRecord]) -> Vec<IpAddr> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .map(|record| record.address)
        .filter(|address| seen.insert(*address))
        .collect()
}

/// Look up one batch with a worker's readers
pub fn lookup_batch(readers: &mut WorkerReaders, batch: &[IpAddr]) -> Vec<AddressInfo> {
    let (asn, country) = readers.readers();
    batch
        .iter()
        .map(|&address| lookup_address(asn, country, address))
        .collect()
}

/// Query both databases for `address`
///
/// A miss or a failed lookup leaves the corresponding fields `None`.
pub fn lookup_address(
    asn: Option<&dyn AsnLookup>,
    country: Option<&dyn CountryLookup>,
    address: IpAddr,
) -> AddressInfo {
    let mut info = AddressInfo::empty(address);

    if let Some(reader) = asn {
        match reader.lookup_asn(address) {
            Ok(Some(record)) => {
                info.asn = record.number;
                info.as_org = record.organization;
            },
            Ok(None) => {},
            Err(e) => debug!(ip = %address, error = %e, "Failed to get ASN info"),
        }
    }

    if let Some(reader) = country {
        match reader.lookup_country(address) {
            Ok(Some(record)) => {
                info.country = record.name;
                info.country_code = record.iso_code;
            },
            Ok(None) => {},
            Err(e) => debug!(ip = %address, error = %e, "Failed to get country info"),
        }
    }

    info
}

/// Attach lookup results to every loaded record
///
/// One output per input record, so an address listed under two bridge types
/// (or twice under one) appears that many times. Records whose address was
/// not enriched are skipped.
pub fn join_records(
    records: &[BridgeRecord],
    enriched: &HashMap<IpAddr, AddressInfo>,
) -> Vec<EnrichedRecord> {
    records
        .iter()
        .filter_map(|record| {
            enriched
                .get(&record.address)
                .map(|info| EnrichedRecord::new(info, record.bridge_type))
        })
        .collect()
}
