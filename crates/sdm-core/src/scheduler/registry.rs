//! Live-segment registry entries.

use crate::part::Part;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Scheduler's view of one running segment. The atomics are shared with
/// the owning Part, so readers always see live positions.
#[derive(Clone)]
pub struct ActivePartInfo {
    pub hash: String,
    pub offset: u64,
    pub end: Arc<AtomicI64>,
    pub read: Arc<AtomicU64>,
    pub stolen: Arc<AtomicBool>,
}

impl ActivePartInfo {
    pub fn from_part(part: &Part) -> Self {
        Self {
            hash: part.hash.clone(),
            offset: part.offset,
            end: Arc::clone(&part.end),
            read: Arc::clone(&part.read),
            stolen: Arc::clone(&part.stolen),
        }
    }

    /// Next byte this segment will write.
    pub fn current_pos(&self) -> u64 {
        self.offset + self.read.load(Ordering::Acquire)
    }

    /// Bytes still to transfer, or 0 when open-ended/overrun.
    pub fn remaining(&self) -> u64 {
        let end = self.end.load(Ordering::Acquire);
        if end < 0 {
            return 0;
        }
        (end as u64 + 1).saturating_sub(self.current_pos())
    }
}
