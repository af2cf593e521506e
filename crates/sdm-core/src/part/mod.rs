//! Single-segment HTTP range transfer.
//!
//! A Part owns one byte range of the download and streams it into its
//! own part file. The range end is an atomic so the scheduler can narrow
//! it while the transfer runs (split, steal); the loop re-reads it every
//! iteration and stops once the narrowed range is satisfied. Every 10th
//! chunk is timed against the expected per-chunk budget; a Part that
//! falls behind reports itself slow and hands the still-open response
//! body back so the caller can decide what to do with the remainder.

mod error;

pub use error::PartError;

use crate::downloader::Handlers;
use crate::storage::DestFile;
use reqwest::header::RANGE;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Chunks between two slow-check measurements.
const SLOW_CHECK_EVERY: u64 = 10;

/// Outcome of one `run` call that did not fail.
pub enum PartStatus {
    /// The (possibly narrowed) range is fully on disk.
    Complete { bytes: u64 },
    /// The transfer fell under the speed target. The response body is
    /// still open; pass it back via `reused` to keep reading.
    Slow { body: reqwest::Response },
}

/// One live segment transfer.
pub struct Part {
    /// 4-hex segment identifier, unique within the download.
    pub hash: String,
    /// Absolute start of this segment in the destination file.
    pub offset: u64,
    /// Inclusive end offset; -1 means open-ended (read to EOF).
    /// Narrowed down by split/steal while the transfer runs.
    pub end: Arc<AtomicI64>,
    /// Bytes written to the part file so far.
    pub read: Arc<AtomicU64>,
    /// Set when a stealer already took this Part's tail.
    pub stolen: Arc<AtomicBool>,

    url: String,
    client: reqwest::Client,
    headers: Vec<(String, String)>,
    chunk_bytes: usize,
    part_path: PathBuf,
    main_file: DestFile,
    speed_limit: u64,
    cancel: CancellationToken,
    events: Arc<dyn Handlers>,
    /// One slow report is swallowed after the scheduler said "keep
    /// running at the segment cap".
    skip_slow_once: AtomicBool,
    /// Slow checks disabled for the rest of the attempt.
    slow_disabled: AtomicBool,
}

pub struct PartInit {
    pub hash: String,
    pub offset: u64,
    pub end: i64,
    pub url: String,
    pub client: reqwest::Client,
    pub headers: Vec<(String, String)>,
    pub chunk_bytes: usize,
    pub part_path: PathBuf,
    pub main_file: DestFile,
    pub speed_limit: u64,
    pub cancel: CancellationToken,
    pub events: Arc<dyn Handlers>,
}

impl Part {
    pub fn new(init: PartInit) -> Self {
        Self {
            hash: init.hash,
            offset: init.offset,
            end: Arc::new(AtomicI64::new(init.end)),
            read: Arc::new(AtomicU64::new(0)),
            stolen: Arc::new(AtomicBool::new(false)),
            url: init.url,
            client: init.client,
            headers: init.headers,
            chunk_bytes: init.chunk_bytes.max(1),
            part_path: init.part_path,
            main_file: init.main_file,
            speed_limit: init.speed_limit,
            cancel: init.cancel,
            events: init.events,
            skip_slow_once: AtomicBool::new(false),
            slow_disabled: AtomicBool::new(false),
        }
    }

    /// Resume bookkeeping: bytes already present in the part file from a
    /// previous run.
    pub fn set_already_read(&self, bytes: u64) {
        self.read.store(bytes, Ordering::Relaxed);
    }

    /// Swallow the next slow report (scheduler decision 2).
    pub fn set_repeated(&self) {
        self.skip_slow_once.store(true, Ordering::Relaxed);
    }

    /// Disable slow checks entirely (scheduler decision 3).
    pub fn disable_slow_checks(&self) {
        self.slow_disabled.store(true, Ordering::Relaxed);
    }

    pub fn part_path(&self) -> &PathBuf {
        &self.part_path
    }

    /// Shared destination handle; only the compile phase writes to it.
    pub fn main_file(&self) -> &DestFile {
        &self.main_file
    }

    /// Total bytes this Part currently owes, or None when open-ended.
    pub fn want(&self) -> Option<u64> {
        let end = self.end.load(Ordering::Acquire);
        if end < 0 {
            None
        } else {
            Some((end as u64).saturating_sub(self.offset) + 1)
        }
    }

    /// Arc-owning entry point for retry closures: the returned future
    /// owns its Part handle instead of borrowing it.
    pub async fn run_arc(
        self: Arc<Self>,
        expected_speed: u64,
        force_no_range: bool,
        reused: Option<reqwest::Response>,
    ) -> Result<PartStatus, PartError> {
        self.run(expected_speed, force_no_range, reused).await
    }

    /// Runs one transfer attempt from `offset + read` to the live end.
    ///
    /// `expected_speed` is the bytes/sec target the slow check measures
    /// against. `force_no_range` suppresses the Range header even for a
    /// bounded range (servers that ignore ranges). `reused` continues
    /// reading from a still-open response returned by a prior Slow.
    pub async fn run(
        &self,
        expected_speed: u64,
        force_no_range: bool,
        reused: Option<reqwest::Response>,
    ) -> Result<PartStatus, PartError> {
        if self.cancel.is_cancelled() {
            return Err(PartError::Cancelled);
        }

        // A resumed segment may already hold its whole range.
        if let Some(want) = self.want() {
            if self.read.load(Ordering::Relaxed) >= want {
                self.verify_on_disk().await?;
                return Ok(PartStatus::Complete {
                    bytes: self.read.load(Ordering::Relaxed),
                });
            }
        }

        let ranged = self.end.load(Ordering::Acquire) >= 0 && !force_no_range;

        // A non-ranged attempt cannot resume mid-stream; restart clean.
        if !ranged && reused.is_none() && self.read.load(Ordering::Relaxed) > 0 {
            tokio::fs::File::create(&self.part_path).await?;
            self.read.store(0, Ordering::Relaxed);
        }

        let mut resp = match reused {
            Some(r) => r,
            None => self.request(ranged).await?,
        };

        let mut file = if self.read.load(Ordering::Relaxed) > 0 {
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(&self.part_path)
                .await?
        } else {
            tokio::fs::File::create(&self.part_path).await?
        };

        let e_time = expected_time_per_chunk(self.chunk_bytes, expected_speed);
        let started = Instant::now();
        let start_read = self.read.load(Ordering::Relaxed);
        let mut chunk_index: u64 = 0;

        loop {
            let have = self.read.load(Ordering::Relaxed);
            if let Some(want) = self.want() {
                if have >= want {
                    break;
                }
            }

            chunk_index += 1;
            let timed = chunk_index % SLOW_CHECK_EVERY == 0;
            let chunk_started = timed.then(Instant::now);

            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => return Err(PartError::Cancelled),
                c = resp.chunk() => c?,
            };

            let Some(chunk) = chunk else {
                // EOF from the source.
                if let Some(want) = self.want() {
                    let have = self.read.load(Ordering::Relaxed);
                    if have < want {
                        file.flush().await?;
                        return Err(PartError::PrematureEof {
                            read: have,
                            expected: want,
                        });
                    }
                }
                break;
            };

            // A narrowed end may leave the tail of this chunk to a new
            // Part; write only what is still ours.
            let have = self.read.load(Ordering::Relaxed);
            let keep = match self.want() {
                Some(want) => want.saturating_sub(have).min(chunk.len() as u64) as usize,
                None => chunk.len(),
            };
            if keep > 0 {
                file.write_all(&chunk[..keep]).await?;
                self.read.fetch_add(keep as u64, Ordering::Release);
                self.events
                    .download_progress(&self.hash, keep as u64);
            }

            if self.speed_limit > 0 {
                self.pace(started, start_read).await;
            }

            if let Some(t0) = chunk_started {
                if t0.elapsed() > e_time
                    && ranged
                    && !self.slow_disabled.load(Ordering::Relaxed)
                {
                    if self.skip_slow_once.swap(false, Ordering::Relaxed) {
                        continue;
                    }
                    file.flush().await?;
                    self.verify_on_disk().await?;
                    return Ok(PartStatus::Slow { body: resp });
                }
            }
        }

        file.flush().await?;
        self.verify_on_disk().await?;
        Ok(PartStatus::Complete {
            bytes: self.read.load(Ordering::Relaxed),
        })
    }

    async fn request(&self, ranged: bool) -> Result<reqwest::Response, PartError> {
        let from = self.offset + self.read.load(Ordering::Relaxed);
        let mut req = self.client.get(&self.url);
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if ranged {
            let end = self.end.load(Ordering::Acquire);
            req = req.header(RANGE, format!("bytes={}-{}", from, end));
        }

        let resp = tokio::select! {
            _ = self.cancel.cancelled() => return Err(PartError::Cancelled),
            r = req.send() => r?,
        };

        let status = resp.status().as_u16();
        let ok = if ranged {
            status == 206 || (status == 200 && from == 0)
        } else {
            status == 200 || status == 206
        };
        if !ok {
            return Err(PartError::UnexpectedStatus(status));
        }
        Ok(resp)
    }

    /// The part file must hold at least as many bytes as the counter
    /// says were written; fewer means bytes were read but never reached
    /// the disk. More can legitimately remain after the range was
    /// narrowed mid-chunk; the compile phase reads exactly the range.
    async fn verify_on_disk(&self) -> Result<(), PartError> {
        let have = self.read.load(Ordering::Relaxed);
        let on_disk = tokio::fs::metadata(&self.part_path).await?.len();
        if on_disk < have {
            return Err(PartError::ShortWrite {
                written: on_disk,
                expected: have,
            });
        }
        Ok(())
    }

    /// Crude token-bucket pacing for the optional rate limit.
    async fn pace(&self, started: Instant, start_read: u64) {
        let transferred = self.read.load(Ordering::Relaxed).saturating_sub(start_read);
        let budget = Duration::from_secs_f64(transferred as f64 / self.speed_limit as f64);
        let elapsed = started.elapsed();
        if budget > elapsed {
            tokio::time::sleep(budget - elapsed).await;
        }
    }
}

/// Expected wall time for one `chunk_bytes` copy at `expected_speed`.
pub fn expected_time_per_chunk(chunk_bytes: usize, expected_speed: u64) -> Duration {
    if expected_speed == 0 {
        return Duration::MAX;
    }
    Duration::from_secs_f64(chunk_bytes as f64 / expected_speed as f64)
}

/// Generates a 4-hex segment hash not present in `taken`.
pub fn gen_part_hash(taken: &std::collections::HashSet<String>) -> String {
    loop {
        let candidate = format!("{:04x}", rand::random::<u16>());
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}
