//! Deterministic lab multiplexer.
//!
//! A controllable, in-memory event source for testing the engine without OS
//! readiness. Tests inject events; delivery respects the same one-shot
//! discipline as the real multiplexer, so arm/fire/re-arm sequencing bugs
//! show up here deterministically.

use super::{Event, Interest, Multiplexer, Token};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

#[derive(Debug)]
struct LabRegistration {
    fd: RawFd,
    interest: Interest,
    armed: bool,
    rearms: usize,
}

#[derive(Debug, Default)]
struct LabState {
    registrations: HashMap<Token, LabRegistration>,
    pending: VecDeque<Event>,
}

/// Deterministic [`Multiplexer`] for tests.
#[derive(Debug, Default)]
pub struct LabMultiplexer {
    state: Mutex<LabState>,
}

impl LabMultiplexer {
    /// Creates an empty lab multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an arbitrary event for the next `wait`.
    pub fn inject(&self, event: Event) {
        self.state.lock().pending.push_back(event);
    }

    /// Queues a read-readiness event for `token`.
    pub fn inject_readable(&self, token: Token) {
        self.inject(Event::readable(token));
    }

    /// Queues a write-readiness event for `token`.
    pub fn inject_writable(&self, token: Token) {
        self.inject(Event::writable(token));
    }

    /// Queues a hangup event for `token`.
    pub fn inject_hangup(&self, token: Token) {
        self.inject(Event::hangup(token));
    }

    /// Whether `token` is registered and armed.
    #[must_use]
    pub fn is_armed(&self, token: Token) -> bool {
        self.state
            .lock()
            .registrations
            .get(&token)
            .is_some_and(|reg| reg.armed)
    }

    /// How many times `token` has been re-armed.
    #[must_use]
    pub fn rearm_count(&self, token: Token) -> usize {
        self.state
            .lock()
            .registrations
            .get(&token)
            .map_or(0, |reg| reg.rearms)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.state.lock().registrations.len()
    }
}

fn matches_interest(event: &Event, interest: Interest) -> bool {
    if event.is_fatal() {
        return true;
    }
    (event.readable && interest.is_readable()) || (event.writable && interest.is_writable())
}

impl Multiplexer for LabMultiplexer {
    fn add(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.registrations.contains_key(&token) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "token already registered",
            ));
        }
        state.registrations.insert(
            token,
            LabRegistration {
                fd,
                interest,
                armed: true,
                rearms: 0,
            },
        );
        Ok(())
    }

    fn rearm(&self, _fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut state = self.state.lock();
        let registration = state.registrations.get_mut(&token).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "token not registered")
        })?;
        registration.interest = interest;
        registration.armed = true;
        registration.rearms += 1;
        Ok(())
    }

    fn delete(&self, fd: RawFd) -> io::Result<()> {
        let mut state = self.state.lock();
        state.registrations.retain(|_, reg| reg.fd != fd);
        Ok(())
    }

    fn wait(&self, events: &mut Vec<Event>, _timeout: Option<Duration>) -> io::Result<usize> {
        let mut state = self.state.lock();
        let mut delivered = 0;
        while let Some(event) = state.pending.pop_front() {
            let Some(registration) = state.registrations.get_mut(&event.token) else {
                // Stale: registration removed after injection.
                continue;
            };
            if !registration.armed || !matches_interest(&event, registration.interest) {
                continue;
            }
            registration.armed = false;
            events.push(event);
            delivered += 1;
        }
        Ok(delivered)
    }

    fn pollable_fd(&self) -> Option<RawFd> {
        None
    }
}
