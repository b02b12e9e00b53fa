//! JSON result files

use bridgescan_common::{BridgeError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::models::EnrichedRecord;

/// Order records by bridge type, then address
///
/// Gives byte-identical files for identical inputs regardless of the order
/// in which files and batches completed.
pub fn sort_records(records: &mut [EnrichedRecord]) {
    records.sort_by(|a, b| a.bridge_type.cmp(&b.bridge_type).then_with(|| a.ip.cmp(&b.ip)));
}

/// Write `records` as a pretty-printed JSON array
pub fn save_json(path: &Path, records: &[EnrichedRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| BridgeError::file_access(path, e))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n").map_err(|e| BridgeError::file_access(path, e))?;
    writer.flush().map_err(|e| BridgeError::file_access(path, e))?;

    info!(path = %path.display(), records = records.len(), "Saved {} records", records.len());
    Ok(())
}
