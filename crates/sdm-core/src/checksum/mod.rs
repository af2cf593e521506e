//! Digest validation for downloads.
//!
//! Servers may advertise one or more digests of the payload (`Digest`,
//! `Content-MD5`). The strongest advertised algorithm is selected and the
//! reassembled byte stream is hashed during the compile phase, in
//! deterministic order, then compared against the advertised value.

mod headers;

pub use headers::{extract_checksums, parse_content_md5, parse_digest_header, DigestParseError};

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

/// Supported digest algorithms, weakest first so `Ord` ranks strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Digest output length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            ChecksumAlgorithm::Md5 => 16,
            ChecksumAlgorithm::Sha256 => 32,
            ChecksumAlgorithm::Sha512 => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server-advertised digest: algorithm plus raw digest bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedChecksum {
    pub algorithm: ChecksumAlgorithm,
    pub raw: Vec<u8>,
}

impl ExpectedChecksum {
    /// Rejects digests whose length does not match the algorithm output.
    pub fn new(algorithm: ChecksumAlgorithm, raw: Vec<u8>) -> Option<Self> {
        if raw.len() == algorithm.digest_len() {
            Some(Self { algorithm, raw })
        } else {
            None
        }
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Outcome of comparing the computed digest against the advertised one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumResult {
    pub algorithm: ChecksumAlgorithm,
    /// Advertised digest, lowercase hex.
    pub expected: String,
    /// Computed digest, lowercase hex.
    pub actual: String,
    pub matched: bool,
}

impl ChecksumResult {
    pub fn compare(expected: &ExpectedChecksum, actual: &[u8]) -> Self {
        let expected_hex = expected.hex();
        let actual_hex = hex::encode(actual);
        let matched = expected_hex == actual_hex;
        Self {
            algorithm: expected.algorithm,
            expected: expected_hex,
            actual: actual_hex,
            matched,
        }
    }
}

/// Picks the strongest advertised digest: SHA-512 > SHA-256 > MD5.
/// Falls back to the first entry when strengths tie.
pub fn select_strongest(checksums: &[ExpectedChecksum]) -> Option<&ExpectedChecksum> {
    checksums
        .iter()
        .max_by(|a, b| a.algorithm.cmp(&b.algorithm))
}

/// Incremental hasher over the selected algorithm.
pub enum StreamHasher {
    Md5(Md5),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamHasher {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => StreamHasher::Md5(Md5::new()),
            ChecksumAlgorithm::Sha256 => StreamHasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => StreamHasher::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamHasher::Md5(h) => h.update(data),
            StreamHasher::Sha256(h) => h.update(data),
            StreamHasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            StreamHasher::Md5(h) => h.finalize().to_vec(),
            StreamHasher::Sha256(h) => h.finalize().to_vec(),
            StreamHasher::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// 128-bit identifier for a download: MD5 over the URL and the final
/// destination path, rendered as 32 lowercase hex chars.
pub fn item_hash(url: &str, absolute_location: &std::path::Path) -> String {
    let mut h = Md5::new();
    h.update(url.as_bytes());
    h.update(b"\n");
    h.update(absolute_location.to_string_lossy().as_bytes());
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_strength_ordering() {
        assert!(ChecksumAlgorithm::Sha512 > ChecksumAlgorithm::Sha256);
        assert!(ChecksumAlgorithm::Sha256 > ChecksumAlgorithm::Md5);
    }

    #[test]
    fn expected_checksum_rejects_wrong_length() {
        assert!(ExpectedChecksum::new(ChecksumAlgorithm::Sha256, vec![0u8; 32]).is_some());
        assert!(ExpectedChecksum::new(ChecksumAlgorithm::Sha256, vec![0u8; 16]).is_none());
        assert!(ExpectedChecksum::new(ChecksumAlgorithm::Md5, vec![0u8; 16]).is_some());
    }

    #[test]
    fn select_strongest_prefers_sha512() {
        let list = vec![
            ExpectedChecksum::new(ChecksumAlgorithm::Md5, vec![0u8; 16]).unwrap(),
            ExpectedChecksum::new(ChecksumAlgorithm::Sha512, vec![0u8; 64]).unwrap(),
            ExpectedChecksum::new(ChecksumAlgorithm::Sha256, vec![0u8; 32]).unwrap(),
        ];
        let best = select_strongest(&list).unwrap();
        assert_eq!(best.algorithm, ChecksumAlgorithm::Sha512);
    }

    #[test]
    fn select_strongest_falls_back_to_first() {
        let list = vec![
            ExpectedChecksum::new(ChecksumAlgorithm::Md5, vec![1u8; 16]).unwrap(),
            ExpectedChecksum::new(ChecksumAlgorithm::Md5, vec![2u8; 16]).unwrap(),
        ];
        let best = select_strongest(&list).unwrap();
        assert_eq!(best.raw, vec![1u8; 16]);
        assert!(select_strongest(&[]).is_none());
    }

    #[test]
    fn stream_hasher_sha256_known_vector() {
        let mut h = StreamHasher::new(ChecksumAlgorithm::Sha256);
        h.update(b"hello");
        h.update(b"\n");
        assert_eq!(
            hex::encode(h.finalize()),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn stream_hasher_md5_known_vector() {
        let mut h = StreamHasher::new(ChecksumAlgorithm::Md5);
        h.update(b"hello\n");
        assert_eq!(hex::encode(h.finalize()), "b1946ac92492d2347c6235b4d2611184");
    }

    #[test]
    fn compare_reports_mismatch() {
        let expected =
            ExpectedChecksum::new(ChecksumAlgorithm::Sha256, vec![0u8; 32]).unwrap();
        let result = ChecksumResult::compare(&expected, &[1u8; 32]);
        assert!(!result.matched);
        assert_eq!(result.algorithm, ChecksumAlgorithm::Sha256);
    }

    #[test]
    fn item_hash_is_stable_and_distinct() {
        let a = item_hash("http://x/file", std::path::Path::new("/tmp/file"));
        let b = item_hash("http://x/file", std::path::Path::new("/tmp/file"));
        let c = item_hash("http://x/file", std::path::Path::new("/tmp/other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }
}
