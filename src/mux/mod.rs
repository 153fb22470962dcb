//! Readiness multiplexing.
//!
//! A small one-shot readiness layer: descriptors are registered with an
//! [`Interest`] under a caller-chosen [`Token`], fire at most once per
//! arming, and must be explicitly re-armed to fire again. The engine talks
//! to the OS through the [`Multiplexer`] trait so tests can substitute the
//! deterministic [`LabMultiplexer`].

mod epoll;
mod interest;
mod lab;
mod registry;

pub use epoll::EpollMultiplexer;
pub use interest::Interest;
pub use lab::LabMultiplexer;
pub use registry::Registry;

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Opaque identifier tying a readiness event back to a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

impl Token {
    /// Creates a token from a raw value.
    #[must_use]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }
}

/// A single readiness event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Token of the registration that fired.
    pub token: Token,
    /// Read readiness.
    pub readable: bool,
    /// Write readiness.
    pub writable: bool,
    /// Error condition on the descriptor.
    pub error: bool,
    /// Peer hangup.
    pub hangup: bool,
}

impl Event {
    /// A read-readiness event.
    #[must_use]
    pub const fn readable(token: Token) -> Self {
        Self {
            token,
            readable: true,
            writable: false,
            error: false,
            hangup: false,
        }
    }

    /// A write-readiness event.
    #[must_use]
    pub const fn writable(token: Token) -> Self {
        Self {
            token,
            readable: false,
            writable: true,
            error: false,
            hangup: false,
        }
    }

    /// A peer-hangup event.
    #[must_use]
    pub const fn hangup(token: Token) -> Self {
        Self {
            token,
            readable: false,
            writable: false,
            error: false,
            hangup: true,
        }
    }

    /// An error event.
    #[must_use]
    pub const fn errored(token: Token) -> Self {
        Self {
            token,
            readable: false,
            writable: false,
            error: true,
            hangup: false,
        }
    }

    /// Whether this event ends the descriptor's useful life.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.error || self.hangup
    }
}

/// One-shot readiness source.
///
/// Every registration is armed for a single firing; after an event is
/// delivered for a token the registration stays known but silent until
/// [`rearm`](Multiplexer::rearm).
pub trait Multiplexer: Send + Sync {
    /// Registers `fd` under `token` for one firing of `interest`.
    ///
    /// # Errors
    ///
    /// Returns the underlying OS error, or `AlreadyExists` for a duplicate
    /// registration of the same descriptor.
    fn add(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()>;

    /// Re-arms an existing registration for one more firing.
    ///
    /// # Errors
    ///
    /// Returns the underlying OS error, or `NotFound` when the descriptor
    /// was never registered.
    fn rearm(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()>;

    /// Removes a registration entirely.
    ///
    /// # Errors
    ///
    /// Returns the underlying OS error.
    fn delete(&self, fd: RawFd) -> io::Result<()>;

    /// Waits up to `timeout` for events, appending them to `events`.
    /// `None` blocks indefinitely; `Some(Duration::ZERO)` polls.
    ///
    /// # Errors
    ///
    /// Returns the underlying OS error. `EINTR` is retried internally.
    fn wait(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<usize>;

    /// The multiplexer's own descriptor, when it has one, so an outer
    /// reactor can nest this multiplexer as a read-readiness source.
    fn pollable_fd(&self) -> Option<RawFd>;
}
