use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration loaded from `~/.config/sdm/config.toml`.
///
/// Values are threaded through constructors; nothing reads this from a
/// process-wide global.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdmConfig {
    /// Maximum concurrent HTTP connections per download.
    pub max_connections: usize,
    /// Maximum number of segments per download. 0 means adaptive
    /// (chosen from the probed speed).
    pub max_segments: usize,
    /// Maximum accepted file size in bytes. -1 means unlimited.
    pub max_file_size: i64,
    /// Copy buffer size used by transfers and the compile phase.
    pub chunk_bytes: usize,
    /// Per-connection throughput target in bytes/sec; a segment that
    /// falls under this is considered slow and may be split.
    pub expected_speed: u64,
    /// Maximum downloads running at once; the rest wait in the queue.
    pub max_concurrent_downloads: usize,
    /// Per-request timeout in seconds. 0 disables the timeout.
    pub per_request_timeout_secs: u64,
    /// Default directory for downloaded files. Empty means the
    /// current working directory.
    pub download_dir: String,
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub retry: RetrySection,
    pub checksum: ChecksumSection,
}

/// Retry/backoff tuning for segment transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
}

/// Digest validation behaviour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumSection {
    /// Hash the reassembled file when the server advertised a digest.
    pub enabled: bool,
    /// Turn a digest mismatch into a download error.
    pub fail_on_mismatch: bool,
}

impl Default for SdmConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            max_segments: 0,
            max_file_size: 100 * 1024 * 1024 * 1024,
            chunk_bytes: 64 * 1024,
            expected_speed: 5 * 1024 * 1024,
            max_concurrent_downloads: 3,
            per_request_timeout_secs: 0,
            download_dir: String::new(),
            log_filter: "info,sdm=debug".to_string(),
            retry: RetrySection::default(),
            checksum: ChecksumSection::default(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl Default for ChecksumSection {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_on_mismatch: true,
        }
    }
}

impl SdmConfig {
    pub fn per_request_timeout(&self) -> Option<Duration> {
        if self.per_request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.per_request_timeout_secs))
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Directory for the state file, per-download part directories and logs.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")?;
    Ok(xdg_dirs.get_state_home())
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SdmConfig::default();
        assert_eq!(cfg.max_connections, 16);
        assert_eq!(cfg.max_segments, 0);
        assert_eq!(cfg.max_file_size, 100 * 1024 * 1024 * 1024);
        assert_eq!(cfg.chunk_bytes, 64 * 1024);
        assert_eq!(cfg.log_filter, "info,sdm=debug");
        assert!(cfg.checksum.enabled);
        assert!(cfg.checksum.fail_on_mismatch);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SdmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_connections, cfg.max_connections);
        assert_eq!(parsed.retry.max_retries, cfg.retry.max_retries);
        assert_eq!(parsed.checksum.enabled, cfg.checksum.enabled);
    }

    #[test]
    fn config_toml_partial_file_fills_defaults() {
        let toml = r#"
            max_connections = 8

            [retry]
            max_retries = 2
        "#;
        let cfg: SdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_connections, 8);
        assert_eq!(cfg.retry.max_retries, 2);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.retry.base_delay_ms, 500);
        assert_eq!(cfg.max_segments, 0);
    }

    #[test]
    fn timeout_zero_means_none() {
        let mut cfg = SdmConfig::default();
        assert!(cfg.per_request_timeout().is_none());
        cfg.per_request_timeout_secs = 30;
        assert_eq!(cfg.per_request_timeout(), Some(Duration::from_secs(30)));
    }
}
