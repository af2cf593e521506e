//! Pre-resume integrity validation.
//!
//! Before a persisted download restarts, everything it claims to have
//! on disk must actually be there; any violation aborts the resume with
//! the exact missing path.

use super::error::ManagerError;
use crate::downloader::PART_FILE_PREFIX;
use crate::item::Item;
use std::path::Path;

/// Checks the per-download directory, every live part file, and — once
/// any bytes were compiled — the non-empty destination file.
pub fn validate_resume(item: &Item, part_dir: &Path) -> Result<(), ManagerError> {
    if !part_dir.is_dir() {
        return Err(ManagerError::DataMissing(part_dir.to_path_buf()));
    }

    for part in item.parts.values() {
        if part.compiled {
            continue;
        }
        let path = part_dir.join(format!("{PART_FILE_PREFIX}{}", part.hash));
        if !path.is_file() {
            return Err(ManagerError::DataMissing(path));
        }
    }

    let any_compiled = item.parts.values().any(|p| p.compiled);
    if any_compiled || item.downloaded > 0 {
        let dest = &item.absolute_location;
        let len = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(ManagerError::DataMissing(dest.clone()));
        }
    }

    Ok(())
}
