//! Lookup databases and the per-worker reader pool
//!
//! Two MMDB files are consulted for every address: GeoLite2-ASN (AS number
//! and organization) and GeoLite2-Country (country name and ISO code).
//!
//! Readers are never shared between concurrent tasks. Each enrichment task
//! leases a [`WorkerReaders`] context from the [`ReaderPool`]; the context
//! opens both databases on first use and keeps them for the rest of the run.
//! A database that is missing or fails to open is simply `None` for that
//! worker. [`ReaderPool::close`] releases every context once the enrichment
//! pool has drained.

use bridgescan_common::{BridgeError, Result};
use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, warn};

/// ASN database entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRecord {
    pub number: Option<u32>,
    pub organization: Option<String>,
}

/// Country database entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryRecord {
    pub name: Option<String>,
    pub iso_code: Option<String>,
}

/// A lookup failed for a reason other than "address not in database"
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("database error: {0}")]
    Database(String),
}

pub trait AsnLookup: Send {
    /// `Ok(None)` when the address has no entry
    fn lookup_asn(&self, ip: IpAddr) -> std::result::Result<Option<AsnRecord>, LookupError>;
}

pub trait CountryLookup: Send {
    /// `Ok(None)` when the address has no entry
    fn lookup_country(&self, ip: IpAddr)
        -> std::result::Result<Option<CountryRecord>, LookupError>;
}

/// Opens fresh reader handles for one worker
///
/// `Ok(None)` means the database is not available at all; `Err` means it
/// exists but could not be opened.
pub trait ReaderSource: Send + Sync {
    fn open_asn(&self) -> Result<Option<Box<dyn AsnLookup>>>;
    fn open_country(&self) -> Result<Option<Box<dyn CountryLookup>>>;
}

// ============================================================================
// MMDB-backed readers
// ============================================================================

/// An open MaxMind DB file
pub struct MmdbReader {
    path: PathBuf,
    reader: Reader<Vec<u8>>,
}

impl MmdbReader {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = Reader::open_readfile(path).map_err(|e| BridgeError::DatabaseOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        debug!(
            path = %path.display(),
            database_type = %reader.metadata.database_type,
            build_epoch = reader.metadata.build_epoch,
            "Opened MMDB file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }
}

impl AsnLookup for MmdbReader {
    fn lookup_asn(&self, ip: IpAddr) -> std::result::Result<Option<AsnRecord>, LookupError> {
        match self.reader.lookup::<geoip2::Asn>(ip) {
            Ok(asn) => Ok(Some(AsnRecord {
                number: asn.autonomous_system_number,
                organization: asn.autonomous_system_organization.map(str::to_owned),
            })),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
            Err(e) => Err(LookupError::Database(e.to_string())),
        }
    }
}

impl CountryLookup for MmdbReader {
    fn lookup_country(
        &self,
        ip: IpAddr,
    ) -> std::result::Result<Option<CountryRecord>, LookupError> {
        match self.reader.lookup::<geoip2::Country>(ip) {
            Ok(found) => {
                let record = found
                    .country
                    .map(|country| CountryRecord {
                        name: country
                            .names
                            .as_ref()
                            .and_then(|names| names.get("en"))
                            .map(|name| (*name).to_owned()),
                        iso_code: country.iso_code.map(str::to_owned),
                    })
                    .unwrap_or_default();
                Ok(Some(record))
            },
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
            Err(e) => Err(LookupError::Database(e.to_string())),
        }
    }
}

/// Opens readers from resolved MMDB paths; either path may be absent
#[derive(Debug, Clone, Default)]
pub struct MmdbSource {
    asn_path: Option<PathBuf>,
    country_path: Option<PathBuf>,
}

impl MmdbSource {
    pub fn new(asn_path: Option<PathBuf>, country_path: Option<PathBuf>) -> Self {
        Self {
            asn_path,
            country_path,
        }
    }

    pub fn has_any(&self) -> bool {
        self.asn_path.is_some() || self.country_path.is_some()
    }
}

impl MmdbSource {
    /// Open `path`, warning when its metadata names another database type
    fn open_expecting(path: &Path, expected: &str) -> Result<MmdbReader> {
        let reader = MmdbReader::open(path)?;
        if !reader.database_type().contains(expected) {
            warn!(
                path = %reader.path().display(),
                database_type = reader.database_type(),
                expected,
                "MMDB file has unexpected database type"
            );
        }
        Ok(reader)
    }
}

impl ReaderSource for MmdbSource {
    fn open_asn(&self) -> Result<Option<Box<dyn AsnLookup>>> {
        match &self.asn_path {
            Some(path) => Ok(Some(Box::new(Self::open_expecting(path, "ASN")?))),
            None => Ok(None),
        }
    }

    fn open_country(&self) -> Result<Option<Box<dyn CountryLookup>>> {
        match &self.country_path {
            Some(path) => Ok(Some(Box::new(Self::open_expecting(path, "Country")?))),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Per-worker context and pool
// ============================================================================

/// Reader handles owned by one enrichment worker
pub struct WorkerReaders {
    id: usize,
    source: Arc<dyn ReaderSource>,
    opened: bool,
    asn: Option<Box<dyn AsnLookup>>,
    country: Option<Box<dyn CountryLookup>>,
}

impl WorkerReaders {
    fn new(id: usize, source: Arc<dyn ReaderSource>) -> Self {
        Self {
            id,
            source,
            opened: false,
            asn: None,
            country: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Handles for this worker, opening both databases on first call
    pub fn readers(&mut self) -> (Option<&dyn AsnLookup>, Option<&dyn CountryLookup>) {
        if !self.opened {
            self.open();
        }
        (self.asn.as_deref(), self.country.as_deref())
    }

    fn open(&mut self) {
        self.opened = true;

        self.asn = match self.source.open_asn() {
            Ok(Some(reader)) => Some(reader),
            Ok(None) => {
                debug!(worker = self.id, "ASN database not available");
                None
            },
            Err(e) => {
                error!(worker = self.id, error = %e, "Unable to open ASN database");
                None
            },
        };

        self.country = match self.source.open_country() {
            Ok(Some(reader)) => Some(reader),
            Ok(None) => {
                debug!(worker = self.id, "Country database not available");
                None
            },
            Err(e) => {
                error!(worker = self.id, error = %e, "Unable to open Country database");
                None
            },
        };
    }

    fn release(&mut self) {
        let asn = self.asn.take();
        let country = self.country.take();
        if asn.is_some() || country.is_some() {
            debug!(
                worker = self.id,
                asn = asn.is_some(),
                country = country.is_some(),
                "Closing MMDB readers"
            );
        }
    }

    /// Release this worker's handles
    pub fn close(mut self) {
        self.release();
    }
}

impl Drop for WorkerReaders {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for WorkerReaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerReaders")
            .field("id", &self.id)
            .field("opened", &self.opened)
            .field("asn", &self.asn.is_some())
            .field("country", &self.country.is_some())
            .finish()
    }
}

/// Hands [`WorkerReaders`] contexts to concurrent tasks
///
/// A context is created only when no idle one exists, so the number of
/// contexts never exceeds the number of tasks running at once.
pub struct ReaderPool {
    source: Arc<dyn ReaderSource>,
    idle: Mutex<Vec<WorkerReaders>>,
    created: AtomicUsize,
}

impl ReaderPool {
    pub fn new(source: Arc<dyn ReaderSource>) -> Self {
        Self {
            source,
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Take an idle context or create a new one
    pub fn checkout(self: &Arc<Self>) -> ReaderLease {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        let readers = reused.unwrap_or_else(|| {
            let id = self.created.fetch_add(1, Ordering::Relaxed);
            WorkerReaders::new(id, Arc::clone(&self.source))
        });

        ReaderLease {
            pool: Arc::clone(self),
            readers: Some(readers),
        }
    }

    fn checkin(&self, readers: WorkerReaders) {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(readers);
    }

    /// Number of worker contexts created so far
    pub fn workers_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Release every idle context; returns how many were closed
    ///
    /// Call after all leases have been returned.
    pub fn close(&self) -> usize {
        let drained: Vec<WorkerReaders> = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();

        let count = drained.len();
        for readers in drained {
            readers.close();
        }

        if count > 0 {
            debug!(workers = count, "Released MMDB reader contexts");
        }
        count
    }
}

impl Drop for ReaderPool {
    fn drop(&mut self) {
        let remaining = self.close();
        if remaining > 0 {
            debug!(workers = remaining, "Released MMDB readers on pool drop");
        }
    }
}

/// Exclusive use of one [`WorkerReaders`]; returned to the pool on drop
pub struct ReaderLease {
    pool: Arc<ReaderPool>,
    readers: Option<WorkerReaders>,
}

impl std::ops::Deref for ReaderLease {
    type Target = WorkerReaders;

    fn deref(&self) -> &WorkerReaders {
        match self.readers.as_ref() {
            Some(readers) => readers,
            None => unreachable!("reader lease used after release"),
        }
    }
}

impl std::ops::DerefMut for ReaderLease {
    fn deref_mut(&mut self) -> &mut WorkerReaders {
        match self.readers.as_mut() {
            Some(readers) => readers,
            None => unreachable!("reader lease used after release"),
        }
    }
}

impl Drop for ReaderLease {
    fn drop(&mut self) {
        if let Some(readers) = self.readers.take() {
            self.pool.checkin(readers);
        }
    }
}
