//! Classify segment errors into retryable and fatal.

use crate::part::PartError;

/// True when the error is worth another attempt with backoff.
///
/// Premature EOF and short writes are retried (the next attempt resumes
/// from the current byte count); transport failures and retryable HTTP
/// statuses are transient; cancellation and local I/O failures are not.
pub fn is_transient(e: &PartError) -> bool {
    match e {
        PartError::Transport(_) => true,
        PartError::PrematureEof { .. } => true,
        PartError::ShortWrite { .. } => true,
        PartError::UnexpectedStatus(code) => matches!(code, 429 | 500..=599),
        PartError::Io(_) | PartError::Cancelled | PartError::RetryExhausted { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premature_eof_and_short_write_retry() {
        assert!(is_transient(&PartError::PrematureEof {
            read: 10,
            expected: 20
        }));
        assert!(is_transient(&PartError::ShortWrite {
            written: 5,
            expected: 10
        }));
    }

    #[test]
    fn throttling_and_5xx_retry() {
        assert!(is_transient(&PartError::UnexpectedStatus(429)));
        assert!(is_transient(&PartError::UnexpectedStatus(503)));
        assert!(is_transient(&PartError::UnexpectedStatus(500)));
    }

    #[test]
    fn client_errors_do_not_retry() {
        assert!(!is_transient(&PartError::UnexpectedStatus(404)));
        assert!(!is_transient(&PartError::UnexpectedStatus(403)));
        assert!(!is_transient(&PartError::UnexpectedStatus(416)));
    }

    #[test]
    fn cancel_and_io_do_not_retry() {
        assert!(!is_transient(&PartError::Cancelled));
        let io = PartError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!is_transient(&io));
    }
}
