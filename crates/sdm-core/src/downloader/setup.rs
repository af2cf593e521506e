//! Destination validation before a transfer starts.

use super::DownloadError;
use std::path::Path;

/// Checks that `dir` exists, is a directory, and is writable (probed by
/// creating and removing a scratch file).
pub fn validate_dir(dir: &Path) -> Result<(), DownloadError> {
    if !dir.exists() {
        return Err(DownloadError::DirectoryNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(DownloadError::NotADirectory(dir.to_path_buf()));
    }
    let probe = dir.join(".sdm-write-probe");
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(DownloadError::DirectoryNotWritable(dir.to_path_buf())),
    }
}

/// Rejects an existing destination unless overwrite was requested.
pub fn check_destination(path: &Path, overwrite: bool) -> Result<(), DownloadError> {
    if path.exists() && !overwrite {
        return Err(DownloadError::FileExists(path.to_path_buf()));
    }
    Ok(())
}
