//! Logging setup: file under the state dir, stderr fallback.

use crate::config::{self, SdmConfig};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// The log file lives next to the state file and part directories.
pub fn log_path() -> Result<PathBuf> {
    Ok(config::state_dir()?.join("sdm.log"))
}

/// `RUST_LOG` wins; the configured filter is the fallback.
fn filter(cfg: &SdmConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_filter.clone()))
}

/// Initialize tracing to the state-dir log file; returns the path in
/// use. An unwritable state dir is an error so the caller can fall back
/// to `init_stderr` instead of crashing.
pub fn init(cfg: &SdmConfig) -> Result<PathBuf> {
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter(cfg))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    tracing::info!("logging to {}", path.display());
    Ok(path)
}

/// Stderr-only logging for when the state dir is unusable.
pub fn init_stderr(cfg: &SdmConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(cfg))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
