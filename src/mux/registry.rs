//! Per-descriptor registration table.
//!
//! Keeps an explicit, auditable record of every descriptor registered with
//! the multiplexer: which token it answers to, what interest it is armed
//! with, and the handler that should run when it fires. Firing disarms the
//! entry; the owner re-arms it once the handler's work allows another event.

use super::{Event, Interest, Multiplexer, Token};
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
struct Entry<H> {
    fd: RawFd,
    interest: Interest,
    armed: bool,
    handler: H,
}

/// Registration table tying tokens to descriptors and handlers.
///
/// `H` is a cheap handler designator, typically an enum the owner matches on
/// after [`dispatch`](Self::dispatch) returns it.
pub struct Registry<H: Copy> {
    mux: Arc<dyn Multiplexer>,
    entries: HashMap<Token, Entry<H>>,
}

impl<H: Copy> Registry<H> {
    /// Creates an empty table over `mux`.
    #[must_use]
    pub fn new(mux: Arc<dyn Multiplexer>) -> Self {
        Self {
            mux,
            entries: HashMap::new(),
        }
    }

    /// Registers `fd` under `token`, armed for one firing of `interest`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` for a duplicate token, or the multiplexer's
    /// registration error.
    pub fn add_oneshot(
        &mut self,
        token: Token,
        fd: RawFd,
        interest: Interest,
        handler: H,
    ) -> io::Result<()> {
        if self.entries.contains_key(&token) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "token already registered",
            ));
        }
        self.mux.add(fd, token, interest)?;
        self.entries.insert(
            token,
            Entry {
                fd,
                interest,
                armed: true,
                handler,
            },
        );
        Ok(())
    }

    /// Re-arms an existing registration for one more firing of `interest`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown token, or the multiplexer's error.
    pub fn rearm(&mut self, token: Token, interest: Interest) -> io::Result<()> {
        let entry = self.entries.get_mut(&token).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "token not registered")
        })?;
        self.mux.rearm(entry.fd, token, interest)?;
        entry.interest = interest;
        entry.armed = true;
        Ok(())
    }

    /// Removes a registration, deregistering the descriptor.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown token, or the multiplexer's error.
    pub fn remove(&mut self, token: Token) -> io::Result<()> {
        let entry = self.entries.remove(&token).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "token not registered")
        })?;
        self.mux.delete(entry.fd)
    }

    /// Resolves a fired event to its handler, disarming the entry.
    ///
    /// Returns `None` for stale events whose registration is gone.
    pub fn dispatch(&mut self, event: &Event) -> Option<H> {
        let entry = self.entries.get_mut(&event.token)?;
        entry.armed = false;
        Some(entry.handler)
    }

    /// Drops every registration, deregistering best-effort.
    pub fn clear(&mut self) {
        for (token, entry) in self.entries.drain() {
            if let Err(err) = self.mux.delete(entry.fd) {
                warn!(token = token.0, fd = entry.fd, error = %err, "deregister failed");
            }
        }
    }

    /// Number of registrations in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a token is currently armed.
    #[must_use]
    pub fn is_armed(&self, token: Token) -> bool {
        self.entries.get(&token).is_some_and(|entry| entry.armed)
    }
}

impl<H: Copy> Drop for Registry<H> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::LabMultiplexer;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Handler {
        Alpha,
        Beta,
    }

    fn registry() -> (Arc<LabMultiplexer>, Registry<Handler>) {
        let mux = Arc::new(LabMultiplexer::new());
        let registry = Registry::new(Arc::clone(&mux) as Arc<dyn Multiplexer>);
        (mux, registry)
    }

    #[test]
    fn add_dispatch_rearm_cycle() {
        let (_mux, mut registry) = registry();
        let token = Token::new(1);
        registry
            .add_oneshot(token, 10, Interest::readable(), Handler::Alpha)
            .unwrap();
        assert!(registry.is_armed(token));

        let handler = registry.dispatch(&Event::readable(token));
        assert_eq!(handler, Some(Handler::Alpha));
        assert!(!registry.is_armed(token));

        registry.rearm(token, Interest::readable()).unwrap();
        assert!(registry.is_armed(token));
    }

    #[test]
    fn duplicate_token_rejected() {
        let (_mux, mut registry) = registry();
        let token = Token::new(2);
        registry
            .add_oneshot(token, 11, Interest::writable(), Handler::Beta)
            .unwrap();
        let err = registry
            .add_oneshot(token, 12, Interest::writable(), Handler::Beta)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn stale_event_resolves_to_none() {
        let (_mux, mut registry) = registry();
        let token = Token::new(3);
        registry
            .add_oneshot(token, 13, Interest::readable(), Handler::Alpha)
            .unwrap();
        registry.remove(token).unwrap();
        assert_eq!(registry.dispatch(&Event::readable(token)), None);
    }

    #[test]
    fn rearm_unknown_token_is_not_found() {
        let (_mux, mut registry) = registry();
        let err = registry
            .rearm(Token::new(99), Interest::readable())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn clear_empties_table_and_multiplexer() {
        let (mux, mut registry) = registry();
        registry
            .add_oneshot(Token::new(4), 14, Interest::readable(), Handler::Alpha)
            .unwrap();
        registry
            .add_oneshot(Token::new(5), 15, Interest::writable(), Handler::Beta)
            .unwrap();
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(mux.registration_count(), 0);
    }
}
