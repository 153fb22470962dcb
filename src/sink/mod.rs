//! Sink contracts and in-process implementations.
//!
//! [`OutputSink`] is the producer-facing surface: hand bytes over, ask for a
//! graceful close, observe the lifecycle state. [`InputSink`] is the mirror
//! for consumers of a connection's inbound side. The descriptor-backed
//! engine lives in [`fd`]; this module holds the traits and the small
//! in-process implementations used for composition and tests.

pub mod fd;

/// Lifecycle of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    /// Accepting data.
    Open = 0,
    /// Close requested; draining already-accepted data.
    Closing = 1,
    /// Terminal. No data is accepted or delivered.
    Closed = 2,
}

impl SinkState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Destination for outgoing bytes.
pub trait OutputSink {
    /// Offers `data` to the sink. Returns `false` when the sink cannot
    /// accept it right now (not open, or backpressure); the caller may
    /// retry later. `true` means the bytes will be delivered in offer order
    /// unless the destination fails.
    fn write(&mut self, data: &[u8]) -> bool;

    /// Requests a graceful close: no new data, already-accepted data still
    /// drains. Idempotent.
    fn request_close(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> SinkState;
}

/// Byte-count callback for [`CallbackOutputSink`]. A positive return means
/// the write was accepted.
pub type OnWrite = Box<dyn FnMut(&[u8]) -> usize + Send>;

/// Close notification callback.
pub type OnClose = Box<dyn FnMut() + Send>;

/// [`OutputSink`] that delegates delivery to a callback.
///
/// Useful for tests and for piping a sink into in-process consumers. Close
/// is immediate; there is no queue to drain.
pub struct CallbackOutputSink {
    on_write: OnWrite,
    on_close: Option<OnClose>,
    state: SinkState,
}

impl CallbackOutputSink {
    /// Creates a sink delivering through `on_write`.
    #[must_use]
    pub fn new<F>(on_write: F) -> Self
    where
        F: FnMut(&[u8]) -> usize + Send + 'static,
    {
        Self {
            on_write: Box::new(on_write),
            on_close: None,
            state: SinkState::Open,
        }
    }

    /// Installs a close notification.
    #[must_use]
    pub fn with_on_close<F>(mut self, on_close: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_close = Some(Box::new(on_close));
        self
    }
}

impl OutputSink for CallbackOutputSink {
    fn write(&mut self, data: &[u8]) -> bool {
        if self.state != SinkState::Open {
            return false;
        }
        (self.on_write)(data) > 0
    }

    fn request_close(&mut self) {
        if self.state == SinkState::Closed {
            return;
        }
        self.state = SinkState::Closed;
        if let Some(mut on_close) = self.on_close.take() {
            on_close();
        }
    }

    fn state(&self) -> SinkState {
        self.state
    }
}

/// Receiver for a connection's inbound side.
///
/// There is deliberately no default implementation of either method:
/// installing a handler (or explicitly installing [`UnconfiguredInputSink`])
/// is a configuration-time decision.
pub trait InputSink {
    /// Delivers a received buffer.
    fn notify_received(&mut self, data: Vec<u8>);

    /// Signals that the inbound side closed.
    fn notify_closed(&mut self);
}

/// [`InputSink`] that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInputSink;

impl InputSink for NullInputSink {
    fn notify_received(&mut self, _data: Vec<u8>) {}

    fn notify_closed(&mut self) {}
}

/// Data callback for [`CallbackInputSink`].
pub type OnData = Box<dyn FnMut(Vec<u8>) + Send>;

/// [`InputSink`] forwarding to callbacks.
pub struct CallbackInputSink {
    on_data: OnData,
    on_close: Option<OnClose>,
}

impl CallbackInputSink {
    /// Creates a sink forwarding data to `on_data`.
    #[must_use]
    pub fn new<F>(on_data: F) -> Self
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        Self {
            on_data: Box::new(on_data),
            on_close: None,
        }
    }

    /// Installs a close notification.
    #[must_use]
    pub fn with_on_close<F>(mut self, on_close: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_close = Some(Box::new(on_close));
        self
    }
}

impl InputSink for CallbackInputSink {
    fn notify_received(&mut self, data: Vec<u8>) {
        (self.on_data)(data);
    }

    fn notify_closed(&mut self) {
        if let Some(mut on_close) = self.on_close.take() {
            on_close();
        }
    }
}

/// [`InputSink`] for components whose inbound side is deliberately absent.
///
/// Any delivery is a wiring bug, so both methods panic. Installing this is
/// an explicit choice; nothing defaults to it.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredInputSink;

impl InputSink for UnconfiguredInputSink {
    fn notify_received(&mut self, _data: Vec<u8>) {
        panic!("input capability not configured: received data");
    }

    fn notify_closed(&mut self) {
        panic!("input capability not configured: received close");
    }
}
