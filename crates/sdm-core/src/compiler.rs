//! Compile phase: merge part files into the destination file.
//!
//! Runs after every segment finished its transfer. Parts are merged in
//! `initial_offset` order with buffered positional writes; each drained
//! part file is removed and reported compiled. The streaming hash (when
//! digest validation is on) consumes exactly the reassembled byte
//! stream, so the digest is computed in deterministic order. Ranges
//! already compiled by a previous run are re-read from the destination
//! so the hash still covers the whole payload.

use crate::checksum::{ChecksumAlgorithm, StreamHasher};
use crate::downloader::{DownloadError, Handlers};
use crate::storage::DestFile;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One segment to merge.
#[derive(Debug, Clone)]
pub struct CompileSource {
    pub hash: String,
    pub ioff: u64,
    /// Inclusive end; resolved to a concrete offset by the time the
    /// compile phase runs, even for open-ended downloads.
    pub foff: u64,
    pub path: PathBuf,
    /// Already merged by a previous run; only re-hashed.
    pub compiled: bool,
}

impl CompileSource {
    pub fn len(&self) -> u64 {
        self.foff - self.ioff + 1
    }
}

#[derive(Debug)]
pub struct CompileOutcome {
    /// Bytes merged by this pass (compiled parts excluded).
    pub merged: u64,
    /// Total payload size covered by the pass.
    pub total: u64,
    pub digest: Option<Vec<u8>>,
}

/// Merges `sources` (sorted by `ioff`) into `dest`. Blocking; callers on
/// the async side run it through `spawn_blocking`.
pub fn compile(
    sources: &[CompileSource],
    dest: &DestFile,
    chunk_bytes: usize,
    hash_algorithm: Option<ChecksumAlgorithm>,
    events: &Arc<dyn Handlers>,
    cancel: &CancellationToken,
) -> Result<CompileOutcome, DownloadError> {
    let mut hasher = hash_algorithm.map(StreamHasher::new);
    let mut buf = vec![0u8; chunk_bytes.max(1)];
    let mut merged = 0u64;
    let mut total = 0u64;
    let mut hashed = 0u64;

    for src in sources {
        if cancel.is_cancelled() {
            return Err(DownloadError::Stopped);
        }
        total += src.len();

        if src.compiled {
            if let Some(h) = hasher.as_mut() {
                rehash_range(src, dest, &mut buf, h, &mut hashed, events, cancel)?;
            }
            continue;
        }

        let mut part_file = std::fs::File::open(&src.path)?;
        let mut done = 0u64;
        let want = src.len();
        while done < want {
            if cancel.is_cancelled() {
                return Err(DownloadError::Stopped);
            }
            let cap = buf.len().min((want - done) as usize);
            let n = part_file.read(&mut buf[..cap])?;
            if n == 0 {
                return Err(DownloadError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "part {} file ended at {} of {} bytes",
                        src.hash, done, want
                    ),
                )));
            }
            dest.write_at(src.ioff + done, &buf[..n])?;
            if let Some(h) = hasher.as_mut() {
                h.update(&buf[..n]);
                hashed += n as u64;
                events.checksum_progress(hashed);
            }
            done += n as u64;
            merged += n as u64;
            events.compile_progress(&src.hash, n as u64);
        }

        drop(part_file);
        std::fs::remove_file(&src.path)?;
        events.compile_complete(&src.hash, want);
        tracing::debug!(part = %src.hash, bytes = want, "segment merged");
    }

    dest.sync()?;

    Ok(CompileOutcome {
        merged,
        total,
        digest: hasher.map(StreamHasher::finalize),
    })
}

/// Feeds an already-merged range from the destination into the hasher.
fn rehash_range(
    src: &CompileSource,
    dest: &DestFile,
    buf: &mut [u8],
    hasher: &mut StreamHasher,
    hashed: &mut u64,
    events: &Arc<dyn Handlers>,
    cancel: &CancellationToken,
) -> Result<(), DownloadError> {
    let want = src.len();
    let mut done = 0u64;
    while done < want {
        if cancel.is_cancelled() {
            return Err(DownloadError::Stopped);
        }
        let cap = buf.len().min((want - done) as usize);
        let n = dest.read_at(src.ioff + done, &mut buf[..cap])?;
        if n == 0 {
            return Err(DownloadError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("destination ended inside compiled part {}", src.hash),
            )));
        }
        hasher.update(&buf[..n]);
        *hashed += n as u64;
        events.checksum_progress(*hashed);
        done += n as u64;
    }
    Ok(())
}
