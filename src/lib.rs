//! Byte-oriented output sinks for OS descriptors.
//!
//! The centerpiece is [`FdOutputSink`]: a non-blocking, thread-safe output
//! sink that delivers bytes to a single destination descriptor (a pipe end,
//! a socket, an inherited fd). Producer threads hand buffers to the sink
//! without ever touching the descriptor; one reactor thread drains the
//! pending queue and performs non-blocking, possibly-partial writes driven
//! by one-shot readiness events.
//!
//! # Architecture
//!
//! ```text
//! producer threads              reactor thread
//! ────────────────              ─────────────────────────────────
//! handle.write(buf) ──┐
//! handle.write(buf) ──┼─▶ bounded queue ──▶ accumulation buffer
//! handle.write(buf) ──┘        │                  │
//!                         wakeup fd          non-blocking write
//!                              │                  │
//!                              └──▶ multiplexer ◀─┘  (one-shot, re-armed)
//! ```
//!
//! The sink owns a small internal [`mux::Multiplexer`] holding exactly two
//! registrations: the wakeup descriptor (read interest) and the destination
//! descriptor (write interest). The multiplexer's own descriptor is exposed
//! through [`FdOutputSink::mux_fd`] so an outer event loop can treat the
//! whole sink as a single event source and call
//! [`FdOutputSink::process_one`] on readiness.
//!
//! Closing is cooperative: [`SinkHandle::request_close`] stops new enqueues
//! and the reactor thread drains what was already accepted before the
//! descriptor is closed and the close callback fires (drain-then-close).
//! A destination hangup or hard write error is fatal to the instance and is
//! reported only through the hangup and close callbacks; unflushed bytes are
//! dropped in that case.

pub mod error;
pub mod mux;
pub mod queue;
pub mod sink;
pub mod wakeup;

#[cfg(test)]
pub mod test_utils;

pub use error::SinkError;
pub use sink::fd::{FdOutputSink, SinkHandle};
pub use sink::{
    CallbackInputSink, CallbackOutputSink, InputSink, NullInputSink, OutputSink, SinkState,
    UnconfiguredInputSink,
};

/// Phase tracking macro for structured test logging.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST START ===");
    };
}

/// Completion marker for structured test logging.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST COMPLETE ===");
    };
}

/// Assertion with logging for better test output.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
