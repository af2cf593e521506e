//! Handler set that narrates download events through tracing.

use sdm_core::checksum::ChecksumResult;
use sdm_core::downloader::{DownloadError, Handlers};
use sdm_core::part::PartError;
use std::time::Duration;

pub struct LogHandlers;

impl Handlers for LogHandlers {
    fn spawn_part(&self, hash: &str, ioff: u64, foff: i64) {
        tracing::debug!(part = hash, ioff, foff, "segment spawned");
    }

    fn respawn_part(&self, old: &str, new_ioff: u64, new_foff_of_old: i64, foff_of_new: i64) {
        tracing::info!(
            part = old,
            new_ioff,
            new_foff_of_old,
            foff_of_new,
            "slow segment split"
        );
    }

    fn work_steal(&self, stealer: &str, victim: &str, ioff: u64, foff: i64) {
        tracing::info!(stealer, victim, ioff, foff, "work steal");
    }

    fn download_complete(&self, hash: &str, total: u64) {
        tracing::debug!(part = hash, bytes = total, "transfer complete");
    }

    fn compile_complete(&self, hash: &str, total: u64) {
        tracing::debug!(part = hash, bytes = total, "merge complete");
    }

    fn retry(&self, hash: &str, attempt: u32, max: u32, delay: Duration, last_err: &PartError) {
        tracing::warn!(
            part = hash,
            attempt,
            max,
            delay_ms = delay.as_millis() as u64,
            error = %last_err,
            "segment retry"
        );
    }

    fn retry_exhausted(&self, hash: &str, attempts: u32, last_err: &PartError) {
        tracing::error!(part = hash, attempts, error = %last_err, "retries exhausted");
    }

    fn error(&self, hash: &str, err: &DownloadError) {
        tracing::error!(part = hash, error = %err, "segment failed");
    }

    fn download_stopped(&self) {
        tracing::info!("download stopped");
    }

    fn checksum_validation(&self, result: &ChecksumResult) {
        if result.matched {
            tracing::info!(algorithm = %result.algorithm, "checksum verified");
        } else {
            tracing::warn!(
                algorithm = %result.algorithm,
                expected = %result.expected,
                actual = %result.actual,
                "checksum mismatch"
            );
        }
    }
}
