//! Waiting queue for the download concurrency cap.
//!
//! Entries wait ordered by priority (high first), FIFO within a
//! priority. The waiting list is persisted with the items map; the
//! active set is not — an active download that never finished is just a
//! waiting download after a restart.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub hash: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub enqueued_at: u64,
}

pub struct Queue {
    max_concurrent: usize,
    active: HashSet<String>,
    /// Kept sorted: priority desc, then enqueue order.
    waiting: Vec<QueueEntry>,
}

impl Queue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            active: HashSet::new(),
            waiting: Vec::new(),
        }
    }

    /// Restores a persisted waiting list (assumed already ordered).
    pub fn restore(&mut self, waiting: Vec<QueueEntry>) {
        self.waiting = waiting;
    }

    /// Registers `hash`. Returns true when it may start immediately;
    /// false when it was queued.
    pub fn add(&mut self, hash: &str, priority: Priority) -> bool {
        if self.active.len() < self.max_concurrent {
            self.active.insert(hash.to_string());
            return true;
        }
        let entry = QueueEntry {
            hash: hash.to_string(),
            priority,
            enqueued_at: now_millis(),
        };
        let pos = self
            .waiting
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(self.waiting.len());
        self.waiting.insert(pos, entry);
        false
    }

    /// Releases `hash`'s slot; returns the next hash to start, already
    /// moved into the active set.
    pub fn on_complete(&mut self, hash: &str) -> Option<String> {
        self.active.remove(hash);
        if self.active.len() >= self.max_concurrent || self.waiting.is_empty() {
            return None;
        }
        let next = self.waiting.remove(0);
        self.active.insert(next.hash.clone());
        Some(next.hash)
    }

    /// Promotes waiting entries into free slots (after a restart).
    /// Returns the hashes moved into the active set, in start order.
    pub fn fill(&mut self) -> Vec<String> {
        let mut started = Vec::new();
        while self.active.len() < self.max_concurrent && !self.waiting.is_empty() {
            let next = self.waiting.remove(0);
            self.active.insert(next.hash.clone());
            started.push(next.hash);
        }
        started
    }

    /// Drops `hash` wherever it is (stopped or flushed downloads).
    pub fn forget(&mut self, hash: &str) {
        self.active.remove(hash);
        self.waiting.retain(|e| e.hash != hash);
    }

    pub fn is_active(&self, hash: &str) -> bool {
        self.active.contains(hash)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn waiting(&self) -> &[QueueEntry] {
        &self.waiting
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
