//! Segment transfer error type for retry classification.

/// Error from a single segment transfer attempt. Kinds are distinguished
/// so the retry layer can resume from the current byte count instead of
/// restarting, and so cancellation is never retried.
#[derive(Debug, thiserror::Error)]
pub enum PartError {
    /// Non-success HTTP status for a segment request.
    #[error("HTTP {0}")]
    UnexpectedStatus(u16),
    /// Network-level failure (connect, reset, timeout). Retryable.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    /// Source signalled EOF before the full range arrived. The retry
    /// layer resumes from `read`, it does not restart.
    #[error("premature EOF: got {read} of {expected} bytes")]
    PrematureEof { read: u64, expected: u64 },
    /// Fewer bytes hit the part file than were read from the network.
    /// Fatal for the attempt, eligible for retry.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: u64, expected: u64 },
    /// Local I/O failure (disk full, permissions). Not retried.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    /// The download context was cancelled. Never retried.
    #[error("cancelled")]
    Cancelled,
    /// The retry budget ran out; carries the final error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<PartError>,
    },
}
