//! Segment scheduling: initial layout, split-on-slow, work stealing.
//!
//! All range narrowing happens under one lock, so two decisions can
//! never split the same remainder. The narrowed end travels through the
//! shared atomic; running Parts observe it on their next loop iteration.

mod registry;

pub use registry::ActivePartInfo;

use crate::conmap::ConMap;
use crate::part::Part;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

/// Completion speed above which a finisher goes looking for a victim.
const STEAL_MIN_SPEED: u64 = 10 * MB;
/// A victim must still owe more than this to be worth stealing from.
const STEAL_MIN_REMAINING: u64 = 5 * MB;

/// Base segment count for an observed probe speed (strict `<` buckets).
pub fn initial_part_count(speed_bps: u64) -> usize {
    if speed_bps < 100 * KB {
        4
    } else if speed_bps < MB {
        6
    } else if speed_bps < 5 * MB {
        8
    } else if speed_bps < 10 * MB {
        10
    } else {
        12
    }
}

/// Effective initial segment count: adaptive base, caller override,
/// connection cap, and never more segments than bytes.
pub fn effective_part_count(
    speed_bps: u64,
    max_segments: usize,
    max_connections: usize,
    total_size: u64,
) -> usize {
    let base = if max_segments > 0 {
        max_segments
    } else {
        initial_part_count(speed_bps)
    };
    base.min(max_connections.max(1))
        .min(total_size.max(1) as usize)
        .max(1)
}

/// Smallest range worth keeping as its own segment, scaled to the total.
pub fn min_part_size(total_size: u64) -> u64 {
    if total_size < 10 * MB {
        256 * KB
    } else if total_size < 100 * MB {
        MB
    } else {
        4 * MB
    }
}

/// Splits `[0, total-1]` into `parts` segments of `⌊total/parts⌋` bytes;
/// the last segment takes the remainder. Inclusive ends.
pub fn plan_segments(total_size: u64, parts: usize) -> Vec<(u64, u64)> {
    if total_size == 0 || parts == 0 {
        return Vec::new();
    }
    let parts = (parts as u64).min(total_size);
    let base = total_size / parts;
    let mut out = Vec::with_capacity(parts as usize);
    for i in 0..parts {
        let start = i * base;
        let end = if i == parts - 1 {
            total_size - 1
        } else {
            (i + 1) * base - 1
        };
        out.push((start, end));
    }
    out
}

/// What a slow segment should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowAction {
    /// Keep the first half; a new segment takes `[new_ioff, new_foff]`.
    Split { new_ioff: u64, new_foff: i64 },
    /// Segment cap reached but connections are free: keep running and
    /// swallow the next slow report.
    Repeat,
    /// No headroom at all: keep running with slow checks off.
    Continue,
}

/// Range granted to a fast finisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealGrant {
    pub victim_hash: String,
    pub ioff: u64,
    pub foff: i64,
}

struct SchedState {
    /// Segments created over the download's lifetime.
    num_parts: usize,
    /// Currently open connections.
    num_connections: usize,
}

/// Per-download scheduler. Shared by all segment workers.
pub struct Scheduler {
    registry: ConMap<String, ActivePartInfo>,
    state: Mutex<SchedState>,
    max_segments: usize,
    max_connections: usize,
    min_part: u64,
}

impl Scheduler {
    pub fn new(max_segments: usize, max_connections: usize, total_size: u64) -> Self {
        Self {
            registry: ConMap::new(),
            state: Mutex::new(SchedState {
                num_parts: 0,
                num_connections: 0,
            }),
            max_segments: max_segments.max(1),
            max_connections: max_connections.max(1),
            min_part: min_part_size(total_size),
        }
    }

    /// Account for the initial fleet before any worker starts.
    pub fn note_initial(&self, count: usize) {
        let mut s = self.state.lock().unwrap();
        s.num_parts += count;
        s.num_connections += count;
    }

    pub fn register(&self, part: &Part) {
        self.registry
            .insert(part.hash.clone(), ActivePartInfo::from_part(part));
    }

    pub fn deregister(&self, hash: &str) {
        self.registry.remove(&hash.to_string());
    }

    pub fn live_parts(&self) -> usize {
        self.registry.len()
    }

    /// Decide what a slow segment does. When the answer is `Split`, this
    /// has already narrowed the caller's end and accounted for the new
    /// segment; the caller only spawns it.
    pub fn on_slow(&self, part: &Part) -> SlowAction {
        let mut s = self.state.lock().unwrap();

        let end = part.end.load(Ordering::Acquire);
        if end < 0 {
            return SlowAction::Continue;
        }
        let current_pos = part.offset + part.read.load(Ordering::Acquire);
        let remaining = (end as u64 + 1).saturating_sub(current_pos);

        if s.num_parts < self.max_segments
            && s.num_connections < self.max_connections
            && remaining > 2 * self.min_part
        {
            let mid = (current_pos + end as u64) / 2;
            part.end.store(mid as i64, Ordering::Release);
            s.num_parts += 1;
            s.num_connections += 1;
            return SlowAction::Split {
                new_ioff: mid + 1,
                new_foff: end,
            };
        }

        if s.num_parts >= self.max_segments && s.num_connections < self.max_connections {
            return SlowAction::Repeat;
        }

        SlowAction::Continue
    }

    /// A segment's worker finished its transfer and closed its
    /// connection. When it finished fast, hand it a stolen tail from the
    /// slowest peer (largest remainder over the threshold; ties go to the
    /// lexicographically smaller hash). The victim is narrowed and marked
    /// before this returns.
    pub fn on_complete(&self, bytes: u64, elapsed: Duration) -> Option<StealGrant> {
        let mut s = self.state.lock().unwrap();
        s.num_connections = s.num_connections.saturating_sub(1);

        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        let speed = (bytes as f64 / secs) as u64;
        if speed <= STEAL_MIN_SPEED {
            return None;
        }
        // The finisher just freed its connection; a steal only needs
        // that slot back.
        if s.num_connections >= self.max_connections {
            return None;
        }

        let victim = self.registry.fold(None::<ActivePartInfo>, |best, _, info| {
            if info.stolen.load(Ordering::Acquire) {
                return best;
            }
            if info.remaining() <= STEAL_MIN_REMAINING {
                return best;
            }
            match best {
                None => Some(info.clone()),
                Some(b) => {
                    let (br, ir) = (b.remaining(), info.remaining());
                    if ir > br || (ir == br && info.hash < b.hash) {
                        Some(info.clone())
                    } else {
                        Some(b)
                    }
                }
            }
        })?;

        let end = victim.end.load(Ordering::Acquire);
        if end < 0 {
            return None;
        }
        let current_pos = victim.current_pos();
        let mid = (current_pos + end as u64) / 2;
        if mid + 1 > end as u64 {
            return None;
        }
        victim.end.store(mid as i64, Ordering::Release);
        victim.stolen.store(true, Ordering::Release);
        s.num_parts += 1;
        s.num_connections += 1;

        Some(StealGrant {
            victim_hash: victim.hash,
            ioff: mid + 1,
            foff: end,
        })
    }
}
