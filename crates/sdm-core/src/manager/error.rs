//! Manager-level errors: lookup, resume validation, flush guards.

use crate::downloader::DownloadError;
use crate::router::RouteError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("download not found: {0}")]
    NotFound(String),
    #[error("download not resumable: {0}")]
    NotResumable(String),
    /// On-disk data required for resume is gone; carries the exact
    /// missing path.
    #[error("download data missing: {0}")]
    DataMissing(PathBuf),
    #[error("download {0} is active; stop it before flushing")]
    FlushWhileDownloading(String),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
