//! Shared fixtures for bridgescan integration tests
//!
//! [`FakeSource`] stands in for the MMDB files: it answers lookups from an
//! in-memory table and can be told to drop a database or to panic on a
//! given address.

#![allow(dead_code)]

use bridgescan::geoip::{AsnLookup, AsnRecord, CountryLookup, CountryRecord, LookupError, ReaderSource};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One row of the fake databases
#[derive(Debug, Clone)]
pub struct Entry {
    pub asn: u32,
    pub org: &'static str,
    pub country: &'static str,
    pub code: &'static str,
}

pub fn entry(asn: u32, org: &'static str, country: &'static str, code: &'static str) -> Entry {
    Entry {
        asn,
        org,
        country,
        code,
    }
}

#[derive(Default)]
pub struct FakeSource {
    table: Arc<HashMap<IpAddr, Entry>>,
    without_asn: bool,
    without_country: bool,
    panic_on: Option<IpAddr>,
    opens: AtomicUsize,
}

impl FakeSource {
    pub fn new(rows: &[(&str, Entry)]) -> Self {
        let table = rows
            .iter()
            .map(|(ip, e)| (ip.parse().unwrap(), e.clone()))
            .collect();
        Self {
            table: Arc::new(table),
            ..Self::default()
        }
    }

    pub fn without_asn(mut self) -> Self {
        self.without_asn = true;
        self
    }

    pub fn without_country(mut self) -> Self {
        self.without_country = true;
        self
    }

    /// Lookups of `ip` panic, failing the whole batch
    pub fn panic_on(mut self, ip: &str) -> Self {
        self.panic_on = Some(ip.parse().unwrap());
        self
    }

    /// Reader handles opened so far (ASN and Country counted separately)
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn reader(&self) -> FakeReader {
        self.opens.fetch_add(1, Ordering::SeqCst);
        FakeReader {
            table: Arc::clone(&self.table),
            panic_on: self.panic_on,
        }
    }
}

impl ReaderSource for FakeSource {
    fn open_asn(&self) -> bridgescan_common::Result<Option<Box<dyn AsnLookup>>> {
        if self.without_asn {
            return Ok(None);
        }
        Ok(Some(Box::new(self.reader())))
    }

    fn open_country(&self) -> bridgescan_common::Result<Option<Box<dyn CountryLookup>>> {
        if self.without_country {
            return Ok(None);
        }
        Ok(Some(Box::new(self.reader())))
    }
}

struct FakeReader {
    table: Arc<HashMap<IpAddr, Entry>>,
    panic_on: Option<IpAddr>,
}

impl FakeReader {
    fn get(&self, ip: IpAddr) -> Option<&Entry> {
        if self.panic_on == Some(ip) {
            panic!("reader failure on {ip}");
        }
        self.table.get(&ip)
    }
}

impl AsnLookup for FakeReader {
    fn lookup_asn(&self, ip: IpAddr) -> Result<Option<AsnRecord>, LookupError> {
        Ok(self.get(ip).map(|e| AsnRecord {
            number: Some(e.asn),
            organization: Some(e.org.to_string()),
        }))
    }
}

impl CountryLookup for FakeReader {
    fn lookup_country(&self, ip: IpAddr) -> Result<Option<CountryRecord>, LookupError> {
        Ok(self.get(ip).map(|e| CountryRecord {
            name: Some(e.country.to_string()),
            iso_code: Some(e.code.to_string()),
        }))
    }
}

/// Write `contents` to `dir/name` and return the path
pub fn write_list(dir: &Path, name: &str, contents: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
