//! Download event callbacks.
//!
//! All methods are invoked from worker tasks and may run concurrently
//! for different segment hashes; implementations must not block.
//! Defaults are no-ops so callers implement only what they observe.

use super::DownloadError;
use crate::checksum::ChecksumResult;
use crate::part::PartError;
use std::time::Duration;

pub trait Handlers: Send + Sync {
    /// A segment was created covering `[ioff, foff]` (`foff == -1` for
    /// an open-ended segment). Fires before any progress for `hash`.
    fn spawn_part(&self, _hash: &str, _ioff: u64, _foff: i64) {}

    /// A slow segment was split: the old segment now ends at
    /// `new_foff_of_old`; a new segment starts at `new_part_ioff` and
    /// ends at `foff_of_new`. The new segment announces its own hash
    /// through `spawn_part`.
    fn respawn_part(
        &self,
        _old_part_hash: &str,
        _new_part_ioff: u64,
        _new_foff_of_old: i64,
        _foff_of_new: i64,
    ) {
    }

    /// A fast finisher took `[stolen_ioff, stolen_foff]` from
    /// `victim_hash`; `stealer_hash` is the new segment covering it.
    fn work_steal(
        &self,
        _stealer_hash: &str,
        _victim_hash: &str,
        _stolen_ioff: u64,
        _stolen_foff: i64,
    ) {
    }

    /// `n` more bytes written to the segment's part file. Emitted in
    /// write order for any one segment.
    fn download_progress(&self, _hash: &str, _n: u64) {}

    /// `n` more bytes merged into the destination file.
    fn compile_progress(&self, _hash: &str, _n: u64) {}

    /// A segment's transfer finished (fires once per segment), or, for
    /// the reserved main hash, the whole download finished.
    fn download_complete(&self, _hash: &str, _total: u64) {}

    /// A segment was fully merged and its part file removed, or, for the
    /// main hash, the compile phase finished.
    fn compile_complete(&self, _hash: &str, _total: u64) {}

    fn retry(&self, _hash: &str, _attempt: u32, _max: u32, _delay: Duration, _last_err: &PartError) {
    }

    fn retry_exhausted(&self, _hash: &str, _attempts: u32, _last_err: &PartError) {}

    fn error(&self, _hash: &str, _err: &DownloadError) {}

    /// All workers observed cancellation and the download unwound.
    fn download_stopped(&self) {}

    fn checksum_progress(&self, _bytes_hashed: u64) {}

    fn checksum_validation(&self, _result: &ChecksumResult) {}
}

/// Handler set that ignores every event.
pub struct NoopHandlers;

impl Handlers for NoopHandlers {}
