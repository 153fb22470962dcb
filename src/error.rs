//! Sink-level errors.
//!
//! Recoverable conditions ([`SinkError::QueueFull`], [`SinkError::NotOpen`])
//! are returned to the immediate caller and never change sink state. Fatal
//! destination-level conditions (hangup, hard write errors) are never
//! surfaced as return values on the producer path; they reach the owner only
//! through the hangup and close callbacks.

use std::io;
use thiserror::Error;

/// Errors reported by the output sink engine.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink has not been bound to a destination descriptor yet.
    #[error("sink is not bound to a descriptor")]
    NotBound,

    /// The sink was already bound; binding is a one-time operation.
    #[error("sink is already bound to a descriptor")]
    AlreadyBound,

    /// The sink left the open state; no further data is accepted.
    #[error("sink is no longer open")]
    NotOpen,

    /// The pending queue is at capacity. Recoverable backpressure: the
    /// caller may retry after the reactor has drained.
    #[error("pending queue is full")]
    QueueFull,

    /// Underlying OS error.
    #[error("I/O error: {source}")]
    Io {
        /// The source I/O error.
        #[from]
        source: io::Error,
    },
}

impl SinkError {
    /// Returns true when the caller may retry the operation later.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueFull | Self::NotOpen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display() {
        let not_bound = SinkError::NotBound;
        assert!(format!("{not_bound:?}").contains("NotBound"));
        assert_eq!(format!("{not_bound}"), "sink is not bound to a descriptor");

        let full = SinkError::QueueFull;
        assert_eq!(format!("{full}"), "pending queue is full");

        let not_open = SinkError::NotOpen;
        assert_eq!(format!("{not_open}"), "sink is no longer open");
    }

    #[test]
    fn from_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broken");
        let err: SinkError = io_err.into();
        assert!(format!("{err}").contains("pipe broken"));
        assert!(matches!(err, SinkError::Io { .. }));
    }

    #[test]
    fn recoverability() {
        assert!(SinkError::QueueFull.is_recoverable());
        assert!(SinkError::NotOpen.is_recoverable());
        assert!(!SinkError::NotBound.is_recoverable());
        assert!(!SinkError::AlreadyBound.is_recoverable());
    }
}
