//! State file encoding and the durable write protocol.
//!
//! One file holds the whole catalogue: items map plus the waiting
//! queue, as self-describing JSON that tolerates unknown fields (older
//! binaries skip newer sections, newer binaries default missing ones).
//!
//! Writes follow a fixed protocol: encode to a buffer, truncate, write
//! from offset 0, and fsync only for user-visible operations. Hot-path
//! progress updates skip the fsync; a crash costs at most the window
//! since the last flush, and the part files on disk recover the rest.

use crate::item::Item;
use crate::queue::QueueEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateFile {
    pub version: u32,
    pub items: BTreeMap<String, Item>,
    pub waiting_queue: Vec<QueueEntry>,
}

/// Decodes state bytes. Empty input is a fresh catalogue; undecodable
/// input is logged and also treated as fresh rather than failing init.
pub fn decode(bytes: &[u8]) -> StateFile {
    if bytes.is_empty() {
        return StateFile::default();
    }
    match serde_json::from_slice(bytes) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "state file undecodable, starting fresh");
            StateFile::default()
        }
    }
}

/// Open state file handle; all writes go through the same descriptor.
pub struct StateStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl StateStore {
    /// Opens (creating if needed) the state file and decodes whatever is
    /// in it.
    pub fn open(path: &Path) -> std::io::Result<(Self, StateFile)> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let state = decode(&bytes);
        Ok((
            Self {
                path: path.to_path_buf(),
                file: Mutex::new(file),
            },
            state,
        ))
    }

    /// Buffer-first durable write: truncate, seek 0, write, then fsync
    /// when `durable` (flush/close paths; progress updates pass false).
    pub fn write(&self, state: &StateFile, durable: bool) -> std::io::Result<()> {
        let buffer = serde_json::to_vec(state)?;
        let mut file = self.file.lock().unwrap();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buffer)?;
        if durable {
            file.sync_all()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemPart;

    fn sample_state() -> StateFile {
        let mut items = BTreeMap::new();
        let mut item = Item {
            hash: "h".repeat(32),
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
                final_offset: 99,
                compiled: false,
            },
        );
        items.insert(item.hash.clone(), item);
        StateFile {
            version: STATE_VERSION,
            items,
            waiting_queue: vec![QueueEntry {
                hash: "h".repeat(32),
                priority: crate::queue::Priority::High,
                enqueued_at: 7,
            }],
        }
    }

    #[test]
    fn roundtrip() {
        let bytes = serde_json::to_vec(&sample_state()).unwrap();
        let back = decode(&bytes);
        assert_eq!(back.items.len(), 1);
        assert_eq!(back.waiting_queue.len(), 1);
        let item = back.items.values().next().unwrap();
        assert_eq!(item.parts[&0].final_offset, 99);
    }

    #[test]
    fn empty_is_fresh() {
        let state = decode(b"");
        assert!(state.items.is_empty());
        assert!(state.waiting_queue.is_empty());
    }

    #[test]
    fn corrupt_is_fresh() {
        let state = decode(b"{\"items\": {\"trunc");
        assert!(state.items.is_empty());
    }

    #[test]
    fn missing_queue_section_loads_cleanly() {
        // A state file from before the queue existed.
        let old = r#"{"version": 1, "items": {}}"#;
        let state = decode(old.as_bytes());
        assert!(state.waiting_queue.is_empty());
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let newer = r#"{"version": 9, "items": {}, "waiting_queue": [], "future": [1,2,3]}"#;
        let state = decode(newer.as_bytes());
        assert_eq!(state.version, 9);
    }

    #[test]
    fn write_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.sdm");
        let (store, _) = StateStore::open(&path).unwrap();
        store.write(&sample_state(), true).unwrap();
        let long = std::fs::metadata(&path).unwrap().len();
        store.write(&StateFile::default(), false).unwrap();
        let short = std::fs::metadata(&path).unwrap().len();
        assert!(short < long, "second write must truncate ({short} vs {long})");
        let state = decode(&std::fs::read(&path).unwrap());
        assert!(state.items.is_empty());
    }

    #[test]
    fn reopen_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.sdm");
        {
            let (store, _) = StateStore::open(&path).unwrap();
            store.write(&sample_state(), true).unwrap();
        }
        let (_, state) = StateStore::open(&path).unwrap();
        assert_eq!(state.items.len(), 1);
    }
}
