//! Handler patching by composition.
//!
//! The Manager never mutates function pointers on the downloader;
//! instead it wraps the user's handler set in this forwarding layer.
//! Every structural event (spawn/respawn/steal/compile) mutates the
//! Item and persists the catalogue before the user sees the event.

use super::ManagerInner;
use crate::checksum::ChecksumResult;
use crate::downloader::{DownloadError, Handlers, MAIN_HASH};
use crate::item::{ItemPart, ItemState};
use crate::part::PartError;
use std::sync::Arc;
use std::time::Duration;

pub(super) struct ItemHandlers {
    mgr: Arc<ManagerInner>,
    state: Arc<ItemState>,
    inner: Arc<dyn Handlers>,
}

impl ItemHandlers {
    pub(super) fn new(
        mgr: Arc<ManagerInner>,
        state: Arc<ItemState>,
        inner: Arc<dyn Handlers>,
    ) -> Self {
        Self { mgr, state, inner }
    }

    fn offset_of(&self, part_hash: &str) -> Option<u64> {
        self.state
            .mem_part
            .lock()
            .unwrap()
            .get(part_hash)
            .copied()
    }
}

impl Handlers for ItemHandlers {
    fn spawn_part(&self, hash: &str, ioff: u64, foff: i64) {
        // Open-ended segments have nothing to persist; they are not
        // resumable anyway.
        if foff >= 0 {
            {
                let mut item = self.state.item.lock().unwrap();
                item.parts.insert(
                    ioff,
                    ItemPart {
                        hash: hash.to_string(),
                        final_offset: foff as u64,
                        compiled: false,
                    },
                );
            }
            self.state
                .mem_part
                .lock()
                .unwrap()
                .insert(hash.to_string(), ioff);
            self.mgr.persist(false);
        }
        self.inner.spawn_part(hash, ioff, foff);
    }

    fn respawn_part(&self, old_hash: &str, new_ioff: u64, new_foff_of_old: i64, foff_of_new: i64) {
        if let Some(offset) = self.offset_of(old_hash) {
            {
                let mut item = self.state.item.lock().unwrap();
                if let Some(part) = item.parts.get_mut(&offset) {
                    part.final_offset = new_foff_of_old.max(0) as u64;
                }
            }
            self.mgr.persist(false);
        }
        self.inner
            .respawn_part(old_hash, new_ioff, new_foff_of_old, foff_of_new);
    }

    fn work_steal(&self, stealer_hash: &str, victim_hash: &str, stolen_ioff: u64, stolen_foff: i64) {
        if let Some(offset) = self.offset_of(victim_hash) {
            {
                let mut item = self.state.item.lock().unwrap();
                if let Some(part) = item.parts.get_mut(&offset) {
                    part.final_offset = stolen_ioff.saturating_sub(1);
                }
            }
            self.mgr.persist(false);
        }
        self.inner
            .work_steal(stealer_hash, victim_hash, stolen_ioff, stolen_foff);
    }

    fn download_progress(&self, hash: &str, n: u64) {
        // Hot path: persists without fsync; crash cost is bounded by the
        // part files on disk.
        self.mgr.persist(false);
        self.inner.download_progress(hash, n);
    }

    fn compile_progress(&self, hash: &str, n: u64) {
        {
            let mut item = self.state.item.lock().unwrap();
            item.downloaded += n;
        }
        self.mgr.persist(false);
        self.inner.compile_progress(hash, n);
    }

    fn compile_complete(&self, hash: &str, total: u64) {
        if hash != MAIN_HASH {
            if let Some(offset) = self.offset_of(hash) {
                {
                    let mut item = self.state.item.lock().unwrap();
                    if let Some(part) = item.parts.get_mut(&offset) {
                        part.compiled = true;
                    }
                }
                self.mgr.persist(false);
            }
        }
        self.inner.compile_complete(hash, total);
    }

    fn download_complete(&self, hash: &str, total: u64) {
        if hash == MAIN_HASH {
            {
                let mut item = self.state.item.lock().unwrap();
                item.parts.clear();
                item.downloaded = if item.total_size >= 0 {
                    item.total_size as u64
                } else {
                    total
                };
                if item.total_size < 0 {
                    item.total_size = total as i64;
                }
            }
            self.state.mem_part.lock().unwrap().clear();
            self.mgr.persist(false);
        }
        self.inner.download_complete(hash, total);
    }

    fn retry(&self, hash: &str, attempt: u32, max: u32, delay: Duration, last_err: &PartError) {
        self.inner.retry(hash, attempt, max, delay, last_err);
    }

    fn retry_exhausted(&self, hash: &str, attempts: u32, last_err: &PartError) {
        self.inner.retry_exhausted(hash, attempts, last_err);
    }

    fn error(&self, hash: &str, err: &DownloadError) {
        self.inner.error(hash, err);
    }

    fn download_stopped(&self) {
        self.inner.download_stopped();
    }

    fn checksum_progress(&self, bytes_hashed: u64) {
        self.inner.checksum_progress(bytes_hashed);
    }

    fn checksum_validation(&self, result: &ChecksumResult) {
        self.inner.checksum_validation(result);
    }
}
