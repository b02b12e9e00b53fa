//! Bridge file loading
//!
//! [`FileLoader::load`] turns one bridge list into [`BridgeRecord`]s.
//! [`FileLoader::load_all`] fans out over every discovered list with a small
//! bounded pool of blocking tasks and concatenates the results in completion
//! order. A file that cannot be read contributes nothing; the other files
//! are unaffected.

use bridgescan_common::{BridgeError, Result};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::models::{BridgeRecord, BridgeType};
use crate::parser::{CacheStats, LineParser};
use crate::progress::create_progress_bar;

/// Upper bound on concurrent file loads; the stage is bound by text I/O
pub const MAX_FILE_WORKERS: usize = 4;

/// A bridge list on disk and the grammar its lines follow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSource {
    pub path: PathBuf,
    pub bridge_type: BridgeType,
}

impl BridgeSource {
    pub fn new(path: impl Into<PathBuf>, bridge_type: BridgeType) -> Self {
        Self {
            path: path.into(),
            bridge_type,
        }
    }
}

/// Loads bridge lists through a shared [`LineParser`]
pub struct FileLoader {
    parser: Arc<LineParser>,
    show_progress: bool,
}

impl FileLoader {
    pub fn new() -> Self {
        Self {
            parser: Arc::new(LineParser::new()),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.parser.stats()
    }

    /// Read one file and keep every line that parses for `bridge_type`
    pub fn load(&self, path: &Path, bridge_type: BridgeType) -> Result<Vec<BridgeRecord>> {
        load_file(&self.parser, path, bridge_type)
    }

    /// Load every source concurrently and merge the records
    #[instrument(skip_all, fields(files = sources.len()))]
    pub async fn load_all(&self, sources: &[BridgeSource]) -> Vec<BridgeRecord> {
        let width = sources.len().clamp(1, MAX_FILE_WORKERS);
        info!("Starting parallel loading of {} files (workers={})", sources.len(), width);

        let pb = create_progress_bar(sources.len() as u64, "Loading files", self.show_progress);

        let mut completed = stream::iter(sources.iter().cloned())
            .map(|source| {
                let parser = Arc::clone(&self.parser);
                async move {
                    let task_source = source.clone();
                    let joined = tokio::task::spawn_blocking(move || {
                        load_file(&parser, &task_source.path, task_source.bridge_type)
                    })
                    .await;
                    (source, joined)
                }
            })
            .buffer_unordered(width);

        let mut all_records = Vec::new();

        while let Some((source, joined)) = completed.next().await {
            match joined {
                Ok(Ok(records)) => {
                    info!(
                        path = %source.path.display(),
                        bridge_type = %source.bridge_type,
                        "Loaded {} {} bridges",
                        records.len(),
                        source.bridge_type
                    );
                    all_records.extend(records);
                },
                Ok(Err(e)) => {
                    error!(path = %source.path.display(), error = %e, "Failed to read bridge file");
                },
                Err(e) => {
                    error!(path = %source.path.display(), error = %e, "Failed to process bridge file");
                },
            }
            pb.inc(1);
        }

        pb.finish_and_clear();

        info!("Total loaded {} bridge IP addresses", all_records.len());
        for (bridge_type, count) in count_by_type(&all_records) {
            info!(bridge_type = %bridge_type, "{}: {} bridges", bridge_type, count);
        }

        all_records
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn load_file(parser: &LineParser, path: &Path, bridge_type: BridgeType) -> Result<Vec<BridgeRecord>> {
    let file = File::open(path).map_err(|e| BridgeError::file_access(path, e))?;
    let reader = BufReader::with_capacity(8192, file);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| BridgeError::file_access(path, e))?;
        // Old Mac line endings arrive as one line
        for piece in line.split('\r') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if let Some(address) = parser.parse(piece, bridge_type) {
                records.push(BridgeRecord::new(address, bridge_type));
            }
        }
    }

    Ok(records)
}

/// Number of records per bridge type, in bridge type order
pub fn count_by_type(records: &[BridgeRecord]) -> BTreeMap<BridgeType, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.bridge_type).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_load_skips_blank_and_unparsable_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "vanilla.txt",
            b"38.229.1.78:80 FP1\n\n   \nnot-an-address FP2\n  192.0.2.1:443 FP3  \n",
        );

        let records = FileLoader::new().load(&path, BridgeType::Vanilla).unwrap();

        assert_eq!(
            records,
            vec![
                BridgeRecord::new("38.229.1.78".parse().unwrap(), BridgeType::Vanilla),
                BridgeRecord::new("192.0.2.1".parse().unwrap(), BridgeType::Vanilla),
            ]
        );
    }

    #[test]
    fn test_load_splits_bare_carriage_returns() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bridges-snowflake-ipv4", b"203.0.113.5\r203.0.113.6\r");

        let records = FileLoader::new().load(&path, BridgeType::SnowflakeIpv4).unwrap();

        assert_eq!(
            records,
            vec![
                BridgeRecord::new("203.0.113.5".parse().unwrap(), BridgeType::SnowflakeIpv4),
                BridgeRecord::new("203.0.113.6".parse().unwrap(), BridgeType::SnowflakeIpv4),
            ]
        );
    }

    #[test]
    fn test_load_crlf_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "vanilla.txt", b"192.0.2.1:443 FP1\r\n192.0.2.2:443 FP2\r\n");
        let records = FileLoader::new().load(&path, BridgeType::Vanilla).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_load_missing_file_is_file_access_error() {
        let dir = TempDir::new().unwrap();
        let err = FileLoader::new()
            .load(&dir.path().join("absent.txt"), BridgeType::Obfs4)
            .unwrap_err();
        assert!(matches!(err, BridgeError::FileAccess { .. }));
    }

    #[test]
    fn test_load_invalid_utf8_is_file_access_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "webtunnel.txt", b"webtunnel 10.0.0.1:443 FP\n\xff\xfe\n");
        let err = FileLoader::new().load(&path, BridgeType::Webtunnel).unwrap_err();
        assert!(matches!(err, BridgeError::FileAccess { .. }));
    }

    #[test]
    fn test_count_by_type() {
        let a = "192.0.2.1".parse().unwrap();
        let records = vec![
            BridgeRecord::new(a, BridgeType::Obfs4),
            BridgeRecord::new(a, BridgeType::Obfs4),
            BridgeRecord::new(a, BridgeType::Vanilla),
        ];
        let counts = count_by_type(&records);
        assert_eq!(counts[&BridgeType::Obfs4], 2);
        assert_eq!(counts[&BridgeType::Vanilla], 1);
        assert!(!counts.contains_key(&BridgeType::Webtunnel));
    }

    #[tokio::test]
    async fn test_load_all_tolerates_missing_and_empty_files() {
        let dir = TempDir::new().unwrap();
        let obfs4 = write_file(&dir, "obfs4.txt", b"obfs4 192.0.2.10:9001 FP cert=a\n");
        let empty = write_file(&dir, "webtunnel.txt", b"");
        let snowflake = write_file(&dir, "bridges-snowflake-ipv6", b"2001:db8::9\n");

        let sources = vec![
            BridgeSource::new(obfs4, BridgeType::Obfs4),
            BridgeSource::new(empty, BridgeType::Webtunnel),
            BridgeSource::new(dir.path().join("vanilla.txt"), BridgeType::Vanilla),
            BridgeSource::new(snowflake, BridgeType::SnowflakeIpv6),
        ];

        let mut records = FileLoader::new().load_all(&sources).await;
        records.sort_by_key(|r| r.bridge_type);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bridge_type, BridgeType::Obfs4);
        assert_eq!(records[1].bridge_type, BridgeType::SnowflakeIpv6);
    }

    #[tokio::test]
    async fn test_load_all_shares_parse_cache_across_files() {
        let dir = TempDir::new().unwrap();
        let line = b"obfs4 192.0.2.10:9001 FP cert=a\n";
        let first = write_file(&dir, "obfs4.txt", line);
        let second = write_file(&dir, "obfs4-copy.txt", line);

        let loader = FileLoader::new();
        let records = loader
            .load_all(&[
                BridgeSource::new(first, BridgeType::Obfs4),
                BridgeSource::new(second, BridgeType::Obfs4),
            ])
            .await;

        // Same-tag duplicates across files are kept
        assert_eq!(records.len(), 2);
        let stats = loader.cache_stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits + stats.misses, 2);
    }

    #[tokio::test]
    async fn test_load_all_empty_input() {
        assert!(FileLoader::new().load_all(&[]).await.is_empty());
    }
}
