//! Fetching databases and bridge lists
//!
//! Every download is best effort: a failure is logged and reported as
//! `false`, and the run carries on with whatever is already on disk.

use bridgescan_common::{BridgeError, Result};
use futures::StreamExt;
use reqwest::{Client, Proxy};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::discovery::{find_database, DatabaseKind};
use crate::models::BridgeType;
use crate::progress::create_download_progress;

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MMDB_BASE_URL: &str = "https://github.com/P3TERX/GeoLite.mmdb/raw/download";
const BRIDGES_BASE_URL: &str =
    "https://raw.githubusercontent.com/scriptzteam/Tor-Bridges-Collector/refs/heads/main";

/// Download location of a lookup database
pub fn database_url(kind: DatabaseKind) -> String {
    format!("{}/{}", MMDB_BASE_URL, kind.download_name())
}

/// Download location of a bridge list
pub fn bridge_url(bridge_type: BridgeType) -> String {
    let suffix = if bridge_type.is_archived() { ".rar" } else { "" };
    format!("{}/bridges-{}{}", BRIDGES_BASE_URL, bridge_type, suffix)
}

/// Name a bridge list download is saved under
///
/// Archived lists keep their `.rar` extension until they are extracted.
pub fn bridge_download_name(bridge_type: BridgeType) -> String {
    let ext = if bridge_type.is_archived() { "rar" } else { "txt" };
    format!("{}.{}", bridge_type, ext)
}

/// Outcome counts of a download step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DownloadSummary {
    fn record(&mut self, ok: bool) {
        if ok {
            self.downloaded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// HTTP downloader with optional proxy
pub struct Downloader {
    client: Client,
    show_progress: bool,
}

impl Downloader {
    /// Build the client; all HTTP(S) traffic goes through `proxy` when given
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("bridgescan/", env!("CARGO_PKG_VERSION")));

        if let Some(url) = proxy {
            let proxy = Proxy::all(url).map_err(|e| BridgeError::download(url, e))?;
            builder = builder.proxy(proxy);
            info!("Using proxy: {}", url);
        }

        let client = builder
            .build()
            .map_err(|e| BridgeError::download("client", e))?;

        Ok(Self {
            client,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Fetch each database unless some accepted spelling already exists
    pub async fn download_databases(&self, mmdb_dir: &Path) -> DownloadSummary {
        let mut summary = DownloadSummary::default();

        for kind in [DatabaseKind::Asn, DatabaseKind::Country] {
            if let Some(existing) = find_database(mmdb_dir, kind) {
                info!(path = %existing.display(), "MMDB file already exists");
                summary.skipped += 1;
                continue;
            }

            let path = mmdb_dir.join(kind.download_name());
            summary.record(self.download_file(&database_url(kind), &path).await);
        }

        summary
    }

    /// Fetch each bridge list that is not on disk yet
    pub async fn download_bridges(&self, bridges_dir: &Path) -> DownloadSummary {
        let mut summary = DownloadSummary::default();

        for bridge_type in BridgeType::ALL {
            let path = bridges_dir.join(bridge_download_name(bridge_type));
            if path.exists() {
                info!(path = %path.display(), "Bridges file already exists");
                summary.skipped += 1;
                continue;
            }

            summary.record(self.download_file(&bridge_url(bridge_type), &path).await);
        }

        summary
    }

    /// Download `url` to `path`, returning whether it succeeded
    pub async fn download_file(&self, url: &str, path: &Path) -> bool {
        info!("Downloading: {}", url);
        match self.fetch(url, path).await {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "Download completed");
                true
            },
            Err(e) => {
                error!(url, error = %e, "Download failed");
                false
            },
        }
    }

    async fn fetch(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BridgeError::download(url, e))?;

        let total = response.content_length().unwrap_or(0);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let pb = create_download_progress(total, &format!("Downloading {}", name), self.show_progress);

        // Written under a temporary name so an interrupted download is
        // never mistaken for a finished file on the next run.
        let partial = partial_path(path);
        let result = async {
            let mut file =
                std::fs::File::create(&partial).map_err(|e| BridgeError::file_access(&partial, e))?;
            let mut downloaded = 0u64;
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| BridgeError::download(url, e))?;
                file.write_all(&chunk)
                    .map_err(|e| BridgeError::file_access(&partial, e))?;
                downloaded += chunk.len() as u64;
                pb.set_position(downloaded);
            }

            file.flush().map_err(|e| BridgeError::file_access(&partial, e))?;
            std::fs::rename(&partial, path).map_err(|e| BridgeError::file_access(path, e))?;
            Ok::<_, BridgeError>(downloaded)
        }
        .await;

        pb.finish_and_clear();
        if result.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        result
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
