//! Per-download journal: one line per retry, split and steal event.
//!
//! Lives next to the part files, so an interrupted download can be
//! inspected after the fact. Wrapped around the user's handler set as a
//! forwarding layer; journal failures never fail the download.

use super::handlers::Handlers;
use crate::checksum::ChecksumResult;
use crate::part::PartError;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct Journal {
    file: Mutex<std::fs::File>,
}

impl Journal {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn line(&self, text: &str) {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut file = self.file.lock().unwrap();
        let _ = writeln!(file, "{millis} {text}");
    }
}

/// Handler layer that journals scheduler and retry events, then forwards
/// everything to the wrapped set.
pub struct JournalingHandlers {
    inner: std::sync::Arc<dyn Handlers>,
    journal: Journal,
}

impl JournalingHandlers {
    pub fn new(inner: std::sync::Arc<dyn Handlers>, journal: Journal) -> Self {
        Self { inner, journal }
    }
}

impl Handlers for JournalingHandlers {
    fn spawn_part(&self, hash: &str, ioff: u64, foff: i64) {
        self.journal.line(&format!("spawn {hash} {ioff}-{foff}"));
        self.inner.spawn_part(hash, ioff, foff);
    }

    fn respawn_part(&self, old: &str, new_ioff: u64, new_foff_of_old: i64, foff_of_new: i64) {
        self.journal.line(&format!(
            "respawn {old} keeps -{new_foff_of_old}, new {new_ioff}-{foff_of_new}"
        ));
        self.inner
            .respawn_part(old, new_ioff, new_foff_of_old, foff_of_new);
    }

    fn work_steal(&self, stealer: &str, victim: &str, ioff: u64, foff: i64) {
        self.journal
            .line(&format!("steal {stealer} takes {ioff}-{foff} from {victim}"));
        self.inner.work_steal(stealer, victim, ioff, foff);
    }

    fn retry(&self, hash: &str, attempt: u32, max: u32, delay: Duration, last_err: &PartError) {
        self.journal.line(&format!(
            "retry {hash} {attempt}/{max} in {}ms: {last_err}",
            delay.as_millis()
        ));
        self.inner.retry(hash, attempt, max, delay, last_err);
    }

    fn retry_exhausted(&self, hash: &str, attempts: u32, last_err: &PartError) {
        self.journal
            .line(&format!("retry-exhausted {hash} after {attempts}: {last_err}"));
        self.inner.retry_exhausted(hash, attempts, last_err);
    }

    fn download_progress(&self, hash: &str, n: u64) {
        self.inner.download_progress(hash, n);
    }

    fn compile_progress(&self, hash: &str, n: u64) {
        self.inner.compile_progress(hash, n);
    }

    fn download_complete(&self, hash: &str, total: u64) {
        self.inner.download_complete(hash, total);
    }

    fn compile_complete(&self, hash: &str, total: u64) {
        self.inner.compile_complete(hash, total);
    }

    fn error(&self, hash: &str, err: &super::DownloadError) {
        self.journal.line(&format!("error {hash}: {err}"));
        self.inner.error(hash, err);
    }

    fn download_stopped(&self) {
        self.journal.line("stopped");
        self.inner.download_stopped();
    }

    fn checksum_progress(&self, bytes_hashed: u64) {
        self.inner.checksum_progress(bytes_hashed);
    }

    fn checksum_validation(&self, result: &ChecksumResult) {
        self.journal.line(&format!(
            "checksum {} expected={} actual={} matched={}",
            result.algorithm, result.expected, result.actual, result.matched
        ));
        self.inner.checksum_validation(result);
    }
}
