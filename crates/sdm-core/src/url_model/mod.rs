//! File-name derivation for downloads.
//!
//! The destination name comes from `Content-Disposition` when present,
//! otherwise from the last URL path segment, sanitized for the local
//! filesystem.

mod content_disposition;
mod sanitize;

pub use content_disposition::parse_content_disposition_filename;
pub use sanitize::sanitize_filename;

/// Name used when neither the URL path nor Content-Disposition yields
/// anything usable.
const DEFAULT_FILENAME: &str = "download.bin";

/// Derives a safe file name for saving a download.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let candidate = content_disposition
        .and_then(parse_content_disposition_filename)
        .filter(|s| !s.is_empty())
        .or_else(|| filename_from_url(url));

    let raw = match candidate {
        Some(c) => c,
        None => return DEFAULT_FILENAME.to_string(),
    };

    let sanitized = sanitize_filename(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Last non-empty path segment of the URL, percent-decoded by the `url`
/// crate's path accessor semantics (the raw segment is used; decoding
/// beyond `%`-sequences in `filename*` is not attempted here).
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_url_path() {
        assert_eq!(
            derive_filename("https://example.com/pool/archive.tar.xz", None),
            "archive.tar.xz"
        );
    }

    #[test]
    fn from_content_disposition() {
        assert_eq!(
            derive_filename(
                "https://example.com/",
                Some("attachment; filename=\"report.pdf\"")
            ),
            "report.pdf"
        );
    }

    #[test]
    fn content_disposition_wins_over_url() {
        assert_eq!(
            derive_filename(
                "https://example.com/archive.zip",
                Some("attachment; filename=real-name.tar.gz")
            ),
            "real-name.tar.gz"
        );
    }

    #[test]
    fn empty_path_falls_back() {
        assert_eq!(derive_filename("https://example.com/", None), "download.bin");
        assert_eq!(derive_filename("https://example.com", None), "download.bin");
    }

    #[test]
    fn reserved_names_fall_back() {
        assert_eq!(derive_filename("https://example.com/..", None), "download.bin");
    }

    #[test]
    fn query_is_ignored() {
        assert_eq!(
            derive_filename("https://example.com/file.iso?token=abc", None),
            "file.iso"
        );
    }
}
