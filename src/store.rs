//! Persisted catalog: bincode with a metadata header, written atomically.

use crate::config::CATALOG_VERSION;
use crate::error::{CatalogError, Result};
use crate::models::Record;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub version: u32,
    pub source_path: String,
    pub source_mtime: u64,
    pub source_size: u64,
    pub record_count: usize,
}

#[derive(Deserialize)]
struct CatalogFileDe {
    metadata: CatalogMetadata,
    records: Vec<Record>,
}

/// Borrows the records so saving does not clone the whole catalog.
#[derive(Serialize)]
struct CatalogFileSer<'a> {
    metadata: CatalogMetadata,
    records: &'a [Record],
}

fn source_metadata(source: &Path) -> Result<(u64, u64)> {
    let metadata =
        fs::metadata(source).map_err(|e| CatalogError::source_unavailable(source, e))?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok((mtime, metadata.len()))
}

fn temp_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn read_catalog_file(destination: &Path) -> io::Result<CatalogFileDe> {
    let file_size = fs::metadata(destination).map(|m| m.len()).unwrap_or(0);
    let file = File::open(destination)?;
    let reader = BufReader::with_capacity(256 * 1024, file);

    bincode::options()
        .with_limit(file_size.saturating_add(1024))
        .deserialize_from(reader)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes `records` to `destination` via a temporary file and rename, so a
/// failed write never leaves a partial catalog behind.
pub fn save_catalog(records: &[Record], source: &Path, destination: &Path) -> Result<()> {
    let (source_mtime, source_size) = source_metadata(source)?;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CatalogError::persistence(destination, e))?;
    }

    let file = CatalogFileSer {
        metadata: CatalogMetadata {
            version: CATALOG_VERSION,
            source_path: source.to_string_lossy().into_owned(),
            source_mtime,
            source_size,
            record_count: records.len(),
        },
        records,
    };

    let tmp_path = temp_path(destination);
    if let Err(e) = write_file(&tmp_path, &file) {
        let _ = fs::remove_file(&tmp_path);
        return Err(CatalogError::persistence(destination, e));
    }

    if let Err(e) = fs::rename(&tmp_path, destination) {
        let _ = fs::remove_file(&tmp_path);
        return Err(CatalogError::persistence(destination, e));
    }

    info!(
        records = records.len(),
        path = ?destination,
        "Catalog saved"
    );
    Ok(())
}

fn write_file(path: &Path, file: &CatalogFileSer<'_>) -> io::Result<()> {
    let out = File::create(path)?;
    let mut writer = BufWriter::new(out);
    bincode::DefaultOptions::new()
        .serialize_into(&mut writer, file)
        .map_err(io::Error::other)?;
    let out = writer.into_inner().map_err(|e| e.into_error())?;
    out.sync_all()
}

/// Loads a persisted catalog without checking it against a source.
pub fn load_catalog(destination: &Path) -> Result<Vec<Record>> {
    let file = read_catalog_file(destination)
        .map_err(|e| CatalogError::source_unavailable(destination, e))?;

    if file.metadata.version != CATALOG_VERSION {
        return Err(CatalogError::source_unavailable(
            destination,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "catalog version {} does not match {}",
                    file.metadata.version, CATALOG_VERSION
                ),
            ),
        ));
    }

    info!(records = file.records.len(), "Catalog loaded");
    Ok(file.records)
}

/// Returns `Ok(Some(records))` when the persisted catalog was built from the
/// current `source`, `Ok(None)` when it is missing, corrupt or stale.
pub fn try_load_catalog(destination: &Path, source: &Path) -> Result<Option<Vec<Record>>> {
    if !destination.exists() {
        return Ok(None);
    }

    let file = match read_catalog_file(destination) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Persisted catalog is corrupt or unreadable");
            return Ok(None);
        }
    };
    let meta = &file.metadata;

    if meta.version != CATALOG_VERSION {
        info!(
            cached = meta.version,
            current = CATALOG_VERSION,
            "Catalog version mismatch"
        );
        return Ok(None);
    }

    let source_str = source.to_string_lossy();
    if meta.source_path != source_str {
        info!(
            cached = %meta.source_path,
            current = %source_str,
            "Catalog source path mismatch"
        );
        return Ok(None);
    }

    let (mtime, size) = source_metadata(source)?;
    if meta.source_mtime != mtime || meta.source_size != size {
        info!(
            cached_mtime = meta.source_mtime,
            current_mtime = mtime,
            cached_size = meta.source_size,
            current_size = size,
            "Source catalog has changed since it was parsed"
        );
        return Ok(None);
    }

    if meta.record_count != file.records.len() {
        warn!(
            expected = meta.record_count,
            found = file.records.len(),
            "Persisted catalog record count mismatch"
        );
        return Ok(None);
    }

    info!(records = meta.record_count, "Catalog reused from previous run");
    Ok(Some(file.records))
}

pub fn is_catalog_fresh(destination: &Path, source: &Path) -> Result<bool> {
    Ok(try_load_catalog(destination, source)?.is_some())
}
