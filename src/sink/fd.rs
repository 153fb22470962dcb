//! Descriptor-backed output sink engine.
//!
//! [`FdOutputSink`] delivers bytes to one OS descriptor without ever letting
//! a producer touch it. Producers go through a cloneable [`SinkHandle`]:
//! `write` copies the bytes into a bounded queue and signals a wakeup
//! descriptor. The owner runs [`FdOutputSink::process_one`] on its reactor
//! thread, which drains the queue into an accumulation buffer and performs
//! non-blocking writes driven by one-shot writability events.
//!
//! Closing is graceful by default: [`SinkHandle::request_close`] stops new
//! enqueues while everything already accepted still drains before the
//! descriptor closes. A destination hangup or hard write error short-cuts
//! that: the hangup callback fires, unflushed bytes are dropped, and the
//! sink finalizes immediately.

use crate::error::SinkError;
use crate::mux::{Event, EpollMultiplexer, Interest, Multiplexer, Registry, Token};
use crate::queue::{BoundedQueue, TryPushError};
use crate::sink::{OutputSink, SinkState};
use crate::wakeup::{set_nonblocking, WakeupFd};
use nix::errno::Errno;
use nix::unistd;
use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Queue bound used by [`FdOutputSink::new`], in buffers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

const WAKEUP_TOKEN: Token = Token::new(0);
const OUTPUT_TOKEN: Token = Token::new(1);

/// State shared between producer handles and the reactor side.
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    bound: AtomicBool,
    queue: BoundedQueue,
    wakeup: WakeupFd,
}

impl Shared {
    fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn try_write(&self, data: &[u8]) -> Result<(), SinkError> {
        if !self.bound.load(Ordering::SeqCst) {
            return Err(SinkError::NotBound);
        }
        if self.state() != SinkState::Open {
            return Err(SinkError::NotOpen);
        }
        match self.queue.try_push(data.to_vec()) {
            Ok(()) => {
                // Already enqueued: a signal failure is not a rejection.
                if let Err(err) = self.wakeup.signal() {
                    error!(error = %err, "wakeup signal failed after enqueue");
                }
                Ok(())
            }
            Err(TryPushError::Full(_)) => Err(SinkError::QueueFull),
            Err(TryPushError::Closed(_)) => Err(SinkError::NotOpen),
        }
    }

    fn request_close(&self) {
        let open = SinkState::Open as u8;
        let closing = SinkState::Closing as u8;
        if self
            .state
            .compare_exchange(open, closing, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.queue.close();
            if let Err(err) = self.wakeup.signal() {
                error!(error = %err, "wakeup signal failed during close request");
            }
            debug!("close requested, draining");
        }
    }
}

/// Cloneable producer-side handle to an [`FdOutputSink`].
///
/// All methods are callable from any thread and never touch the destination
/// descriptor.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    shared: Arc<Shared>,
}

impl SinkHandle {
    /// Offers `data` to the sink. `false` means the sink is not accepting
    /// right now (unbound, not open, or the queue is full).
    #[must_use]
    pub fn write(&self, data: &[u8]) -> bool {
        match self.shared.try_write(data) {
            Ok(()) => true,
            Err(err) => {
                trace!(len = data.len(), error = %err, "write rejected");
                false
            }
        }
    }

    /// [`write`](Self::write) with the rejection reason.
    ///
    /// `Ok` means the bytes were enqueued; once enqueued they are never
    /// reported as rejected, even if the wakeup signal fails.
    ///
    /// # Errors
    ///
    /// [`SinkError::NotBound`], [`SinkError::NotOpen`], or
    /// [`SinkError::QueueFull`].
    pub fn try_write(&self, data: &[u8]) -> Result<(), SinkError> {
        self.shared.try_write(data)
    }

    /// Requests a graceful close. Idempotent; already-accepted data still
    /// drains before the descriptor closes.
    pub fn request_close(&self) {
        self.shared.request_close();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SinkState {
        self.shared.state()
    }
}

impl OutputSink for SinkHandle {
    fn write(&mut self, data: &[u8]) -> bool {
        SinkHandle::write(self, data)
    }

    fn request_close(&mut self) {
        SinkHandle::request_close(self);
    }

    fn state(&self) -> SinkState {
        SinkHandle::state(self)
    }
}

/// Which registration fired, as recorded in the registration table.
#[derive(Debug, Clone, Copy)]
enum FdHandler {
    Wakeup,
    Output,
}

/// Non-blocking output sink over a single OS descriptor.
///
/// Owned by one reactor thread, which alone calls [`bind`](Self::bind) and
/// [`process_one`](Self::process_one). Producers write through
/// [`handle`](Self::handle). Dropping the engine finalizes the close:
/// outstanding handles observe `Closed` and their writes fail fast.
pub struct FdOutputSink {
    shared: Arc<Shared>,
    mux: Arc<dyn Multiplexer>,
    registry: Registry<FdHandler>,
    buffer: Vec<u8>,
    events: Vec<Event>,
    output_fd: Option<OwnedFd>,
    fd_ready: bool,
    on_hangup: Option<Box<dyn FnMut() + Send>>,
    on_close: Option<Box<dyn FnMut() + Send>>,
}

impl FdOutputSink {
    /// Creates a sink with the default queue capacity and an epoll
    /// multiplexer. Inert until [`bind`](Self::bind).
    ///
    /// # Errors
    ///
    /// Returns any OS error from creating the multiplexer or the wakeup
    /// descriptor.
    pub fn new<H, C>(on_hangup: H, on_close: C) -> io::Result<Self>
    where
        H: FnMut() + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY, on_hangup, on_close)
    }

    /// [`new`](Self::new) with an explicit queue bound.
    ///
    /// # Errors
    ///
    /// Returns any OS error from creating the multiplexer or the wakeup
    /// descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity<H, C>(capacity: usize, on_hangup: H, on_close: C) -> io::Result<Self>
    where
        H: FnMut() + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        let mux = Arc::new(EpollMultiplexer::new()?);
        Self::with_multiplexer(mux, capacity, on_hangup, on_close)
    }

    /// Full construction with an injected multiplexer. Tests pass a
    /// [`LabMultiplexer`](crate::mux::LabMultiplexer) to drive readiness
    /// deterministically.
    ///
    /// # Errors
    ///
    /// Returns any OS error from creating the wakeup descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_multiplexer<H, C>(
        mux: Arc<dyn Multiplexer>,
        capacity: usize,
        on_hangup: H,
        on_close: C,
    ) -> io::Result<Self>
    where
        H: FnMut() + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        let wakeup = WakeupFd::new()?;
        let shared = Arc::new(Shared {
            state: AtomicU8::new(SinkState::Open as u8),
            bound: AtomicBool::new(false),
            queue: BoundedQueue::new(capacity),
            wakeup,
        });
        let registry = Registry::new(Arc::clone(&mux));
        Ok(Self {
            shared,
            mux,
            registry,
            buffer: Vec::new(),
            events: Vec::new(),
            output_fd: None,
            fd_ready: false,
            on_hangup: Some(Box::new(on_hangup)),
            on_close: Some(Box::new(on_close)),
        })
    }

    /// A producer-side handle. Cheap to clone and share across threads.
    #[must_use]
    pub fn handle(&self) -> SinkHandle {
        SinkHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// One-time association with the destination descriptor. Sets it
    /// non-blocking and registers both it and the wakeup descriptor with
    /// the multiplexer, one-shot.
    ///
    /// # Errors
    ///
    /// [`SinkError::AlreadyBound`] on a second call, or the OS error from
    /// flag manipulation or registration.
    pub fn bind(&mut self, fd: OwnedFd) -> Result<(), SinkError> {
        if self.output_fd.is_some() {
            return Err(SinkError::AlreadyBound);
        }
        set_nonblocking(&fd)?;
        self.registry.add_oneshot(
            WAKEUP_TOKEN,
            self.shared.wakeup.as_raw_fd(),
            Interest::readable(),
            FdHandler::Wakeup,
        )?;
        if let Err(err) = self.registry.add_oneshot(
            OUTPUT_TOKEN,
            fd.as_raw_fd(),
            Interest::writable(),
            FdHandler::Output,
        ) {
            if let Err(cleanup) = self.registry.remove(WAKEUP_TOKEN) {
                error!(error = %cleanup, "wakeup deregistration failed during bind rollback");
            }
            return Err(err.into());
        }
        debug!(fd = fd.as_raw_fd(), "bound destination descriptor");
        self.output_fd = Some(fd);
        self.shared.bound.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// The internal multiplexer's descriptor, for nesting the whole sink as
    /// one readable event source in an outer reactor. `None` for
    /// multiplexers without a descriptor (the lab one).
    #[must_use]
    pub fn mux_fd(&self) -> Option<RawFd> {
        self.mux.pollable_fd()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SinkState {
        self.shared.state()
    }

    /// One bounded reactor pass: poll the internal multiplexer with zero
    /// timeout, dispatch fired registrations, then finalize the close if a
    /// requested drain has completed. Returns `true` while the sink is
    /// still active, `false` once `Closed`.
    ///
    /// Never blocks and performs at most one destination write per
    /// writability event; remaining bytes re-arm for the next pass.
    pub fn process_one(&mut self) -> bool {
        if self.shared.state() == SinkState::Closed {
            return false;
        }

        let mut events = std::mem::take(&mut self.events);
        events.clear();
        if let Err(err) = self.mux.wait(&mut events, Some(Duration::ZERO)) {
            error!(error = %err, "multiplexer wait failed");
        }
        for event in &events {
            match self.registry.dispatch(event) {
                Some(FdHandler::Wakeup) => self.handle_wakeup(event),
                Some(FdHandler::Output) => self.handle_output(event),
                None => trace!(token = event.token.0, "stale event dropped"),
            }
            if self.shared.state() == SinkState::Closed {
                break;
            }
        }
        events.clear();
        self.events = events;

        if self.shared.state() == SinkState::Closing
            && self.buffer.is_empty()
            && self.shared.queue.is_empty()
        {
            self.finalize_close();
        }
        self.shared.state() != SinkState::Closed
    }

    fn handle_wakeup(&mut self, event: &Event) {
        if !event.readable {
            return;
        }
        if let Err(err) = self.shared.wakeup.reset() {
            error!(error = %err, "wakeup reset failed");
        }
        // Re-arm before draining: a signal raised after the drain then
        // lands on an armed registration instead of being lost.
        if let Err(err) = self.registry.rearm(WAKEUP_TOKEN, Interest::readable()) {
            error!(error = %err, "wakeup re-arm failed");
        }
        let drained = self.shared.queue.drain_into(&mut self.buffer);
        if drained > 0 {
            trace!(buffers = drained, pending = self.buffer.len(), "queue drained");
        }
        if self.fd_ready && !self.buffer.is_empty() {
            self.flush();
        }
    }

    fn handle_output(&mut self, event: &Event) {
        if event.is_fatal() {
            debug!(
                error = event.error,
                hangup = event.hangup,
                "destination failed"
            );
            self.report_hangup();
            self.finalize_close();
            return;
        }
        if event.writable {
            self.fd_ready = true;
            if !self.buffer.is_empty() {
                self.flush();
            }
        }
    }

    /// One non-blocking write of the buffer front. Partial writes and
    /// `EAGAIN` re-arm for writability; hard errors finalize the sink.
    fn flush(&mut self) {
        let result = loop {
            let Some(fd) = self.output_fd.as_ref() else {
                return;
            };
            match unistd::write(fd.as_fd(), &self.buffer) {
                Err(Errno::EINTR) => continue,
                other => break other,
            }
        };
        match result {
            Ok(written) => {
                self.buffer.drain(..written);
                trace!(written, remaining = self.buffer.len(), "flushed");
                if !self.buffer.is_empty() {
                    self.await_writable();
                }
            }
            Err(Errno::EAGAIN) => {
                self.await_writable();
            }
            Err(errno) => {
                debug!(error = %errno, "destination write failed");
                self.report_hangup();
                self.finalize_close();
            }
        }
    }

    fn await_writable(&mut self) {
        self.fd_ready = false;
        if let Err(err) = self.registry.rearm(OUTPUT_TOKEN, Interest::writable()) {
            error!(error = %err, "output re-arm failed");
        }
    }

    fn report_hangup(&mut self) {
        if let Some(mut on_hangup) = self.on_hangup.take() {
            on_hangup();
        }
        if !self.buffer.is_empty() {
            debug!(dropped = self.buffer.len(), "unflushed bytes dropped");
            self.buffer.clear();
        }
    }

    /// Deregisters both descriptors, closes the destination, and fires the
    /// close callback. Terminal; safe to call more than once.
    fn finalize_close(&mut self) {
        if self.shared.state() == SinkState::Closed {
            return;
        }
        self.registry.clear();
        self.shared.queue.close();
        self.buffer.clear();
        self.output_fd = None;
        self.shared
            .state
            .store(SinkState::Closed as u8, Ordering::SeqCst);
        if let Some(mut on_close) = self.on_close.take() {
            on_close();
        }
        debug!("sink closed");
    }
}

impl Drop for FdOutputSink {
    fn drop(&mut self) {
        self.finalize_close();
    }
}

impl OutputSink for FdOutputSink {
    fn write(&mut self, data: &[u8]) -> bool {
        match self.shared.try_write(data) {
            Ok(()) => true,
            Err(err) => {
                trace!(len = data.len(), error = %err, "write rejected");
                false
            }
        }
    }

    fn request_close(&mut self) {
        self.shared.request_close();
    }

    fn state(&self) -> SinkState {
        self.shared.state()
    }
}
