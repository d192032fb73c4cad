//! Temp-file spill for large query results.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::QueryRecord;
use crate::error::Result;

/// Serializes `records` as a JSON array into a temp file and returns its
/// path. The file is persisted: the caller owns deleting it after use.
pub(crate) fn spill_records(temp_dir: &Path, records: &[QueryRecord]) -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("query-")
        .suffix(".json")
        .tempfile_in(temp_dir)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, records)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let (_, path) = file
        .keep()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(path)
}
