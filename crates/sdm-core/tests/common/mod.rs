pub mod range_server;

use sdm_core::checksum::{ChecksumAlgorithm, ChecksumResult, StreamHasher};
use sdm_core::downloader::Handlers;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Base64 digest of `data` under `algorithm`, as servers advertise it.
pub fn digest_b64(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
    use base64::Engine;
    let mut hasher = StreamHasher::new(algorithm);
    hasher.update(data);
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Handler set that counts events for assertions.
#[derive(Default)]
pub struct RecordingHandlers {
    pub spawns: AtomicUsize,
    pub respawns: AtomicUsize,
    pub steals: AtomicUsize,
    pub retries: AtomicUsize,
    pub stops: AtomicUsize,
    pub progress_bytes: AtomicU64,
    pub completes: Mutex<Vec<(String, u64)>>,
    pub validations: Mutex<Vec<ChecksumResult>>,
}

impl Handlers for RecordingHandlers {
    fn spawn_part(&self, _hash: &str, _ioff: u64, _foff: i64) {
        self.spawns.fetch_add(1, Ordering::SeqCst);
    }

    fn respawn_part(&self, _old: &str, _new_ioff: u64, _new_foff_of_old: i64, _foff_of_new: i64) {
        self.respawns.fetch_add(1, Ordering::SeqCst);
    }

    fn work_steal(&self, _stealer: &str, _victim: &str, _ioff: u64, _foff: i64) {
        self.steals.fetch_add(1, Ordering::SeqCst);
    }

    fn download_progress(&self, _hash: &str, n: u64) {
        self.progress_bytes.fetch_add(n, Ordering::SeqCst);
    }

    fn download_complete(&self, hash: &str, total: u64) {
        self.completes
            .lock()
            .unwrap()
            .push((hash.to_string(), total));
    }

    fn retry(
        &self,
        _hash: &str,
        _attempt: u32,
        _max: u32,
        _delay: std::time::Duration,
        _last_err: &sdm_core::part::PartError,
    ) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn download_stopped(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn checksum_validation(&self, result: &ChecksumResult) {
        self.validations.lock().unwrap().push(result.clone());
    }
}
