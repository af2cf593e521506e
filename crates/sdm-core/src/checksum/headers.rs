//! Parse server digest headers: `Digest` (RFC 3230) and `Content-MD5`.

use base64::Engine;

use super::{ChecksumAlgorithm, ExpectedChecksum};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("empty digest header")]
    Empty,
    #[error("malformed digest entry: {0:?}")]
    Malformed(String),
    #[error("invalid base64 in digest value: {0:?}")]
    BadBase64(String),
    #[error("digest length does not match algorithm {algorithm}")]
    BadLength { algorithm: ChecksumAlgorithm },
}

/// Parses an RFC 3230 `Digest` header value: comma-separated
/// `algorithm=base64`. Only `md5`, `sha-256` and `sha-512` are
/// recognized; other algorithms are skipped. Returns an error for an
/// empty header or a malformed recognized entry.
pub fn parse_digest_header(value: &str) -> Result<Vec<ExpectedChecksum>, DigestParseError> {
    if value.trim().is_empty() {
        return Err(DigestParseError::Empty);
    }

    let mut out = Vec::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, b64) = entry
            .split_once('=')
            .ok_or_else(|| DigestParseError::Malformed(entry.to_string()))?;
        let algorithm = match name.trim().to_ascii_lowercase().as_str() {
            "md5" => ChecksumAlgorithm::Md5,
            "sha-256" => ChecksumAlgorithm::Sha256,
            "sha-512" => ChecksumAlgorithm::Sha512,
            _ => continue,
        };
        out.push(decode_entry(algorithm, b64.trim())?);
    }
    Ok(out)
}

/// Parses a `Content-MD5` header value (RFC 2616): bare base64 MD5.
pub fn parse_content_md5(value: &str) -> Result<ExpectedChecksum, DigestParseError> {
    if value.trim().is_empty() {
        return Err(DigestParseError::Empty);
    }
    decode_entry(ChecksumAlgorithm::Md5, value.trim())
}

fn decode_entry(
    algorithm: ChecksumAlgorithm,
    b64: &str,
) -> Result<ExpectedChecksum, DigestParseError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|_| DigestParseError::BadBase64(b64.to_string()))?;
    ExpectedChecksum::new(algorithm, raw).ok_or(DigestParseError::BadLength { algorithm })
}

/// Reads both digest headers from a probe response and merges the
/// recognized entries. Unparseable headers are logged and skipped so a
/// misbehaving server cannot block the download itself.
pub fn extract_checksums(headers: &reqwest::header::HeaderMap) -> Vec<ExpectedChecksum> {
    let mut out = Vec::new();

    if let Some(value) = headers.get("digest").and_then(|v| v.to_str().ok()) {
        match parse_digest_header(value) {
            Ok(list) => out.extend(list),
            Err(e) => tracing::warn!(error = %e, "ignoring unparseable Digest header"),
        }
    }

    if let Some(value) = headers.get("content-md5").and_then(|v| v.to_str().ok()) {
        match parse_content_md5(value) {
            Ok(c) => out.push(c),
            Err(e) => tracing::warn!(error = %e, "ignoring unparseable Content-MD5 header"),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn b64(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    #[test]
    fn parse_digest_single_sha256() {
        let value = format!("sha-256={}", b64(&[7u8; 32]));
        let list = parse_digest_header(&value).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(list[0].raw, vec![7u8; 32]);
    }

    #[test]
    fn parse_digest_multiple_entries_and_unknown_skipped() {
        let value = format!(
            "unixsum=30637, sha-512={}, sha-256={}",
            b64(&[1u8; 64]),
            b64(&[2u8; 32])
        );
        let list = parse_digest_header(&value).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].algorithm, ChecksumAlgorithm::Sha512);
        assert_eq!(list[1].algorithm, ChecksumAlgorithm::Sha256);
    }

    #[test]
    fn parse_digest_rejects_empty_and_malformed() {
        assert_eq!(parse_digest_header(""), Err(DigestParseError::Empty));
        assert!(matches!(
            parse_digest_header("sha-256"),
            Err(DigestParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_digest_header("sha-256=!!!"),
            Err(DigestParseError::BadBase64(_))
        ));
    }

    #[test]
    fn parse_digest_rejects_wrong_length() {
        let value = format!("sha-256={}", b64(&[1u8; 16]));
        assert_eq!(
            parse_digest_header(&value),
            Err(DigestParseError::BadLength {
                algorithm: ChecksumAlgorithm::Sha256
            })
        );
    }

    #[test]
    fn parse_content_md5_value() {
        let c = parse_content_md5(&b64(&[9u8; 16])).unwrap();
        assert_eq!(c.algorithm, ChecksumAlgorithm::Md5);
        assert_eq!(c.raw, vec![9u8; 16]);
        assert_eq!(parse_content_md5(" "), Err(DigestParseError::Empty));
    }

    #[test]
    fn extract_merges_both_headers() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "digest",
            format!("sha-256={}", b64(&[3u8; 32])).parse().unwrap(),
        );
        headers.insert("content-md5", b64(&[4u8; 16]).parse().unwrap());
        let list = extract_checksums(&headers);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(list[1].algorithm, ChecksumAlgorithm::Md5);
    }

    #[test]
    fn extract_skips_bad_header_without_failing() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("digest", "sha-256=???".parse().unwrap());
        assert!(extract_checksums(&headers).is_empty());
    }
}
