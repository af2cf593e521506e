//! Download-level error type (probe, setup, transfer, compile).

use crate::checksum::ChecksumAlgorithm;
use crate::part::PartError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Content-Length of 0, or negative and not the unknown sentinel.
    #[error("invalid content length {0}")]
    ContentLengthInvalid(i64),
    #[error("file too large: {size} bytes over limit {max}")]
    FileTooLarge { size: i64, max: i64 },
    #[error("download directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("directory not writable: {0}")]
    DirectoryNotWritable(PathBuf),
    /// `download`/`resume` called before `probe`. Programmer error.
    #[error("probe must complete before download or resume")]
    ProbeRequired,
    /// Destination exists and overwrite was not requested.
    #[error("destination already exists: {0}")]
    FileExists(PathBuf),
    #[error("checksum mismatch ({algorithm}): expected {expected}, got {actual}")]
    ChecksumMismatch {
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },
    /// A segment failed fatally (including retry exhaustion).
    #[error("segment {hash}: {source}")]
    Part { hash: String, source: PartError },
    /// The root context was cancelled via `stop`.
    #[error("download stopped")]
    Stopped,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
