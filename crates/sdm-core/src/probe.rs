//! Metadata probing: size, range support, file name, digests.
//!
//! Prefers a HEAD request; some servers block HEAD or omit
//! Content-Length there, so a GET for the first byte (`bytes=0-0`) is
//! the fallback, reading the total from `Content-Range`.

use crate::checksum::{self, ExpectedChecksum};
use crate::downloader::DownloadError;
use crate::url_model;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};

/// Everything the downloader needs to know before transferring.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub file_name: String,
    /// Total size in bytes; -1 when the server did not say (streaming).
    pub content_length: i64,
    /// Server advertised `Accept-Ranges: bytes` and the size is known.
    pub resumable: bool,
    /// Digests advertised via `Digest` / `Content-MD5`.
    pub checksums: Vec<ExpectedChecksum>,
    /// URL after redirects; a different origin than the request URL
    /// means custom headers must be reduced to the safe set.
    pub final_url: url::Url,
}

pub async fn probe(
    client: &reqwest::Client,
    url: &str,
    headers: &[(String, String)],
    max_file_size: i64,
) -> Result<ProbeResult, DownloadError> {
    let head = send_probe(client, url, headers, false).await;

    let (resp, ranged_fallback) = match head {
        Ok(resp) if resp.status().is_success() && header_u64(&resp, CONTENT_LENGTH).is_some() => {
            (resp, false)
        }
        _ => {
            tracing::debug!(url, "HEAD unusable, probing with zero-range GET");
            let resp = send_probe(client, url, headers, true).await?.error_for_status()?;
            (resp, true)
        }
    };

    let accept_ranges = if ranged_fallback {
        resp.status().as_u16() == 206
    } else {
        resp.headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false)
    };

    let content_length: i64 = if ranged_fallback {
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(total_from_content_range)
            .map(|n| n as i64)
            .unwrap_or(-1)
    } else {
        header_u64(&resp, CONTENT_LENGTH)
            .map(|n| n as i64)
            .unwrap_or(-1)
    };

    validate_content_length(content_length, max_file_size)?;

    let content_disposition = resp
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let checksums = checksum::extract_checksums(resp.headers());
    let final_url = resp.url().clone();

    let file_name = url_model::derive_filename(final_url.as_str(), content_disposition.as_deref());

    Ok(ProbeResult {
        file_name,
        content_length,
        resumable: accept_ranges && content_length > 0,
        checksums,
        final_url,
    })
}

async fn send_probe(
    client: &reqwest::Client,
    url: &str,
    headers: &[(String, String)],
    zero_range_get: bool,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut req = if zero_range_get {
        client.get(url).header(RANGE, "bytes=0-0")
    } else {
        client.head(url)
    };
    for (name, value) in headers {
        req = req.header(name.as_str(), value.as_str());
    }
    req.send().await
}

fn header_u64(resp: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<u64> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Total size from `Content-Range: bytes 0-0/12345`; `*` means unknown.
fn total_from_content_range(value: &str) -> Option<u64> {
    let total = value.rsplit('/').next()?;
    if total == "*" {
        return None;
    }
    total.trim().parse().ok()
}

/// A size of 0 is rejected outright; negative sizes other than the
/// unknown sentinel are rejected; a known size may not exceed
/// `max_file_size` unless that is -1 (unlimited).
pub fn validate_content_length(content_length: i64, max_file_size: i64) -> Result<(), DownloadError> {
    if content_length == 0 || content_length < -1 {
        return Err(DownloadError::ContentLengthInvalid(content_length));
    }
    if max_file_size >= 0 && content_length > max_file_size {
        return Err(DownloadError::FileTooLarge {
            size: content_length,
            max: max_file_size,
        });
    }
    Ok(())
}
