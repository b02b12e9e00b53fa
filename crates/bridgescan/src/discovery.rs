//! Locating databases and bridge lists on disk

use bridgescan_common::{BridgeError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::loader::BridgeSource;
use crate::models::BridgeType;

/// The two lookup databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    Asn,
    Country,
}

impl DatabaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Asn => "asn",
            DatabaseKind::Country => "country",
        }
    }

    /// Accepted file names, most common spelling first
    pub fn file_names(&self) -> &'static [&'static str] {
        match self {
            DatabaseKind::Asn => &["GeoLite2-ASN.mmdb", "GeoLite2-Asn.mmdb", "geolite2-asn.mmdb"],
            DatabaseKind::Country => &[
                "GeoLite2-COUNTRY.mmdb",
                "GeoLite2-Country.mmdb",
                "GeoLite2-country.mmdb",
                "geolite2-country.mmdb",
            ],
        }
    }

    /// Name a fresh download is saved under
    pub fn download_name(&self) -> &'static str {
        match self {
            DatabaseKind::Asn => "GeoLite2-ASN.mmdb",
            DatabaseKind::Country => "GeoLite2-Country.mmdb",
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create every directory the run reads from
pub fn ensure_directories<P: AsRef<Path>>(dirs: &[P]) -> Result<()> {
    for dir in dirs {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| BridgeError::file_access(dir, e))?;
    }
    info!("Created MMDB and Bridges directories");
    Ok(())
}

/// First existing file among the accepted names of `kind`
pub fn find_database(dir: &Path, kind: DatabaseKind) -> Option<PathBuf> {
    let found = kind
        .file_names()
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file());

    match &found {
        Some(path) => info!(kind = %kind, path = %path.display(), "Found {} database file", kind),
        None => warn!(
            kind = %kind,
            "No {} database file found, tried filenames: {:?}",
            kind,
            kind.file_names()
        ),
    }

    found
}

/// Bridge lists present in `dir`, in bridge type order
pub fn discover_bridge_files(dir: &Path) -> Vec<BridgeSource> {
    let mut sources = Vec::new();

    for bridge_type in BridgeType::ALL {
        let path = dir.join(bridge_type.file_name());
        if path.is_file() {
            sources.push(BridgeSource::new(path, bridge_type));
        } else if bridge_type.is_archived() {
            warn!(path = %path.display(), "Snowflake file does not exist");
        }
    }

    sources
}

/// `.rar` archives waiting in `dir`
pub fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| BridgeError::file_access(dir, e))?;

    let mut archives = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BridgeError::file_access(dir, e))?.path();
        let is_rar = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("rar"));
        if is_rar && path.is_file() {
            archives.push(path);
        }
    }
    archives.sort();

    Ok(archives)
}
