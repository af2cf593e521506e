//! Scheme dispatch: URL → protocol downloader.
//!
//! Only http/https ship here; other protocol factories plug in at this
//! seam.

use crate::downloader::{DownloadOpts, Downloader};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Builds the downloader for `url`'s scheme.
pub fn downloader_for(
    client: reqwest::Client,
    url: &str,
    opts: DownloadOpts,
) -> Result<Downloader, RouteError> {
    let parsed = url::Url::parse(url)?;
    match parsed.scheme() {
        "http" | "https" => Ok(Downloader::new(client, url.to_string(), opts)),
        other => Err(RouteError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdmConfig;

    fn opts(dir: &std::path::Path) -> DownloadOpts {
        DownloadOpts::from_config(
            &SdmConfig::default(),
            dir.to_path_buf(),
            dir.join("state"),
        )
    }

    #[test]
    fn http_and_https_route() {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        assert!(downloader_for(client.clone(), "http://x/f", opts(dir.path())).is_ok());
        assert!(downloader_for(client, "https://x/f", opts(dir.path())).is_ok());
    }

    #[test]
    fn other_schemes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let err = downloader_for(client, "ftp://x/f", opts(dir.path())).unwrap_err();
        assert!(matches!(err, RouteError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn garbage_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        assert!(matches!(
            downloader_for(client, "not a url", opts(dir.path())),
            Err(RouteError::InvalidUrl(_))
        ));
    }
}
