//! Reading and writing catalog files
//!
//! Each file is a pretty-printed JSON array. Writes go through a temporary file
//! in the same directory followed by a rename, and are skipped when the bytes
//! on disk already match.

use crate::error::{DartsHubError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Read a catalog file
///
/// Returns `None` if the file does not exist. A file that exists but does not
/// parse is an error naming the file; it is never replaced by defaults.
pub fn read_file<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Option<Vec<T>>> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    let items = serde_json::from_slice(&bytes).map_err(|source| DartsHubError::CatalogParse {
        file: file.to_string(),
        source,
    })?;
    Ok(Some(items))
}

/// Serialize items the way they are stored on disk
pub fn to_bytes<T: Serialize>(items: &[T]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(items)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write a catalog file atomically; returns whether anything was written
pub fn write_file<T: Serialize>(dir: &Path, file: &str, items: &[T]) -> Result<bool> {
    let bytes = to_bytes(items)?;
    let path = dir.join(file);
    if std::fs::read(&path).is_ok_and(|current| current == bytes) {
        debug!("{file} unchanged");
        return Ok(false);
    }

    std::fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(&path).map_err(|e| DartsHubError::IoError(e.error))?;
    info!("Saved {file}");
    Ok(true)
}
