//! Persistent download records.
//!
//! `Item` is the serializable record written to the state file;
//! `ItemState` is its runtime wrapper holding the locks and the active
//! downloader handle. Keeping the two apart means no "transient field"
//! rules on the serialized type.

use crate::downloader::Downloader;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One persisted segment: identity, inclusive end, merge status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPart {
    pub hash: String,
    pub final_offset: u64,
    /// Bytes are in the destination file and the part file is gone.
    #[serde(default)]
    pub compiled: bool,
}

/// One persisted download, keyed in the state file by `hash`.
///
/// `parts` maps each segment's initial offset to its record; live
/// entries keep disjoint closed ranges (a crash between a split's two
/// persists can leave a tail overlap, which resume tolerates).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub hash: String,
    pub name: String,
    pub url: String,
    pub download_location: PathBuf,
    pub absolute_location: PathBuf,
    /// -1 while unknown (streaming download).
    pub total_size: i64,
    /// Bytes actually merged into the destination file.
    pub downloaded: u64,
    pub resumable: bool,
    pub parts: BTreeMap<u64, ItemPart>,
    /// Request headers to re-send on resume, in order.
    pub headers: Vec<(String, String)>,
    /// Hidden from top-level listings.
    pub children: bool,
}

impl Item {
    /// Linear scan is fine at segment counts; the hot path uses the
    /// runtime reverse index instead.
    pub fn part_offset_by_hash(&self, part_hash: &str) -> Option<u64> {
        self.parts
            .iter()
            .find(|(_, p)| p.hash == part_hash)
            .map(|(off, _)| *off)
    }

    pub fn finished(&self) -> bool {
        self.total_size >= 0 && self.downloaded == self.total_size as u64
    }
}

/// Runtime wrapper: item lock, reverse part index, active downloader.
///
/// The downloader cell has its own lock so progress handlers (which hold
/// the item lock) never contend with `stop`/`is_downloading`.
pub struct ItemState {
    pub item: Mutex<Item>,
    /// part hash → initial offset.
    pub mem_part: Mutex<HashMap<String, u64>>,
    dl: Mutex<Option<Arc<Downloader>>>,
}

impl ItemState {
    pub fn new(item: Item) -> Arc<Self> {
        let mem_part = item
            .parts
            .iter()
            .map(|(off, p)| (p.hash.clone(), *off))
            .collect();
        Arc::new(Self {
            item: Mutex::new(item),
            mem_part: Mutex::new(mem_part),
            dl: Mutex::new(None),
        })
    }

    pub fn snapshot(&self) -> Item {
        self.item.lock().unwrap().clone()
    }

    pub fn is_downloading(&self) -> bool {
        self.dl.lock().unwrap().is_some()
    }

    pub fn set_downloader(&self, dl: Arc<Downloader>) {
        *self.dl.lock().unwrap() = Some(dl);
    }

    pub fn clear_downloader(&self) {
        *self.dl.lock().unwrap() = None;
    }

    /// Atomically snapshots and clears the active downloader so the
    /// caller can cancel it outside the lock.
    pub fn take_downloader(&self) -> Option<Arc<Downloader>> {
        self.dl.lock().unwrap().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_parts() -> Item {
        let mut item = Item {
            hash: "a".repeat(32),
            name: "f.bin".into(),
            url: "http://x/f.bin".into(),
            total_size: 100,
            resumable: true,
            ..Item::default()
        };
        item.parts.insert(
            0,
            ItemPart {
                hash: "00aa".into(),
                final_offset: 49,
                compiled: false,
            },
        );
        item.parts.insert(
            50,
            ItemPart {
                hash: "00bb".into(),
                final_offset: 99,
                compiled: true,
            },
        );
        item
    }

    #[test]
    fn reverse_lookup_by_part_hash() {
        let item = item_with_parts();
        assert_eq!(item.part_offset_by_hash("00bb"), Some(50));
        assert_eq!(item.part_offset_by_hash("ffff"), None);
    }

    #[test]
    fn finished_requires_known_size() {
        let mut item = item_with_parts();
        assert!(!item.finished());
        item.downloaded = 100;
        assert!(item.finished());
        item.total_size = -1;
        assert!(!item.finished());
    }

    #[test]
    fn state_builds_reverse_index() {
        let state = ItemState::new(item_with_parts());
        let idx = state.mem_part.lock().unwrap();
        assert_eq!(idx.get("00aa"), Some(&0));
        assert_eq!(idx.get("00bb"), Some(&50));
    }

    #[test]
    fn item_decode_tolerates_unknown_fields() {
        let json = r#"{
            "hash": "abc",
            "name": "f",
            "url": "http://x/f",
            "some_future_field": {"nested": true},
            "total_size": 10
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.total_size, 10);
        assert!(item.parts.is_empty());
    }
}
