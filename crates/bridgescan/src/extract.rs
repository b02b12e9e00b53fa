//! Unpacking archived bridge lists
//!
//! The snowflake lists are published as RAR archives. Each archive in the
//! bridges directory is unpacked in place; a list that is already present
//! is not unpacked again. A failed archive is logged and the run continues
//! with the lists it has.

use bridgescan_common::{BridgeError, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use unrar::Archive;

use crate::discovery::find_archives;
use crate::models::BridgeType;

/// Outcome counts of an extraction step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Bridge list an archive is expected to contain, by archive name
///
/// `snowflake-ipv4.rar` holds `bridges-snowflake-ipv4`.
pub fn archived_list(bridges_dir: &Path, archive: &Path) -> Option<PathBuf> {
    let stem = archive.file_stem()?;
    BridgeType::ALL
        .into_iter()
        .filter(|t| t.is_archived())
        .find(|t| stem == t.as_str())
        .map(|t| bridges_dir.join(t.file_name()))
}

/// Unpack every `.rar` archive in `bridges_dir` into `bridges_dir`
pub fn extract_archives(bridges_dir: &Path) -> ExtractSummary {
    let mut summary = ExtractSummary::default();

    let archives = match find_archives(bridges_dir) {
        Ok(archives) => archives,
        Err(e) => {
            warn!(error = %e, "Unable to scan for archives");
            return summary;
        },
    };

    for archive in archives {
        let expected = archived_list(bridges_dir, &archive);
        if let Some(list) = expected.as_deref().filter(|list| list.is_file()) {
            info!(archive = %archive.display(), list = %list.display(), "Archive already extracted");
            summary.skipped += 1;
            continue;
        }

        info!("Extracting: {}", archive.display());
        match extract_archive(&archive, bridges_dir) {
            Ok(entries) => {
                info!(archive = %archive.display(), entries, "Extraction completed");
                summary.extracted += 1;
                if let Some(list) = expected.filter(|list| !list.is_file()) {
                    warn!(
                        archive = %archive.display(),
                        expected = %list.display(),
                        "Archive did not contain the expected bridge list"
                    );
                }
            },
            Err(e) => {
                error!(archive = %archive.display(), error = %e, "Extraction failed");
                summary.failed += 1;
            },
        }
    }

    summary
}

/// Unpack the files of one archive into `dest`; returns how many were written
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let fail = |e| BridgeError::extract(archive, e);

    let mut open = Archive::new(archive).open_for_processing().map_err(fail)?;
    let mut written = 0;

    while let Some(header) = open.read_header().map_err(fail)? {
        open = if header.entry().is_file() {
            written += 1;
            header.extract_with_base(dest).map_err(fail)?
        } else {
            header.skip().map_err(fail)?
        };
    }

    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archived_list_by_name() {
        let dir = Path::new("/data/Bridges");
        assert_eq!(
            archived_list(dir, &dir.join("snowflake-ipv6.rar")),
            Some(dir.join("bridges-snowflake-ipv6"))
        );
        assert_eq!(archived_list(dir, &dir.join("obfs4.rar")), None);
        assert_eq!(archived_list(dir, &dir.join("other.rar")), None);
    }

    #[test]
    fn test_corrupt_archive_fails_without_stopping_others() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("snowflake-ipv4.rar"), b"not a rar archive").unwrap();
        std::fs::write(dir.path().join("snowflake-ipv6.rar"), b"also not one").unwrap();

        let summary = extract_archives(dir.path());

        assert_eq!(summary, ExtractSummary { extracted: 0, skipped: 0, failed: 2 });
        assert!(!dir.path().join("bridges-snowflake-ipv4").exists());
    }

    #[test]
    fn test_extracted_list_is_not_unpacked_again() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("snowflake-ipv4.rar"), b"not a rar archive").unwrap();
        std::fs::write(dir.path().join("bridges-snowflake-ipv4"), "203.0.113.5\n").unwrap();

        let summary = extract_archives(dir.path());

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("bridges-snowflake-ipv4")).unwrap(),
            "203.0.113.5\n"
        );
    }

    #[test]
    fn test_extract_archive_error_names_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snowflake-ipv6.rar");
        std::fs::write(&path, b"garbage").unwrap();

        let err = extract_archive(&path, dir.path()).unwrap_err();
        assert!(matches!(err, BridgeError::Extract { .. }));
        assert!(err.to_string().contains("snowflake-ipv6.rar"));
    }

    #[test]
    fn test_missing_directory_is_empty_summary() {
        let dir = TempDir::new().unwrap();
        assert_eq!(extract_archives(&dir.path().join("absent")), ExtractSummary::default());
    }
}
