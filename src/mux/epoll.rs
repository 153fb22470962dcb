//! Epoll-backed one-shot multiplexer.
//!
//! Every registration carries `EPOLLONESHOT`, so the kernel disarms a
//! descriptor after reporting it once and [`Multiplexer::rearm`] maps to
//! `epoll_ctl(MOD)`. The epoll instance's own descriptor polls readable
//! whenever it has events, which is what lets an outer reactor nest one of
//! these as a single event source.

use super::{Event, Interest, Multiplexer, Token};
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::time::Duration;

/// [`Multiplexer`] implementation over Linux epoll.
#[derive(Debug)]
pub struct EpollMultiplexer {
    epoll: Epoll,
}

impl EpollMultiplexer {
    /// Creates a fresh epoll instance (close-on-exec).
    ///
    /// # Errors
    ///
    /// Returns the OS error from `epoll_create1`.
    pub fn new() -> io::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        Ok(Self { epoll })
    }
}

fn epoll_flags(interest: Interest) -> EpollFlags {
    let mut flags = EpollFlags::EPOLLONESHOT;
    if interest.is_readable() {
        flags |= EpollFlags::EPOLLIN;
    }
    if interest.is_writable() {
        flags |= EpollFlags::EPOLLOUT;
    }
    flags
}

fn decode(raw: &EpollEvent) -> Event {
    let flags = raw.events();
    Event {
        token: Token::new(raw.data() as usize),
        readable: flags.contains(EpollFlags::EPOLLIN),
        writable: flags.contains(EpollFlags::EPOLLOUT),
        error: flags.contains(EpollFlags::EPOLLERR),
        hangup: flags.contains(EpollFlags::EPOLLHUP) || flags.contains(EpollFlags::EPOLLRDHUP),
    }
}

fn to_epoll_timeout(timeout: Option<Duration>) -> EpollTimeout {
    match timeout {
        None => EpollTimeout::NONE,
        Some(duration) => {
            let millis = u16::try_from(duration.as_millis()).unwrap_or(u16::MAX);
            EpollTimeout::from(millis)
        }
    }
}

impl Multiplexer for EpollMultiplexer {
    fn add(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let event = EpollEvent::new(epoll_flags(interest), token.0 as u64);
        // SAFETY: the caller keeps `fd` open for the lifetime of the
        // registration; we only borrow it for the duration of the syscall.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll.add(borrowed, event).map_err(io::Error::from)
    }

    fn rearm(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = EpollEvent::new(epoll_flags(interest), token.0 as u64);
        // SAFETY: see `add`.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll
            .modify(borrowed, &mut event)
            .map_err(io::Error::from)
    }

    fn delete(&self, fd: RawFd) -> io::Result<()> {
        // SAFETY: see `add`.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll.delete(borrowed).map_err(io::Error::from)
    }

    fn wait(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<usize> {
        let mut raw_events: [EpollEvent; 16] = core::array::from_fn(|_| EpollEvent::empty());
        let count = loop {
            match self.epoll.wait(&mut raw_events, to_epoll_timeout(timeout)) {
                Ok(count) => break count,
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(io::Error::from(errno)),
            }
        };
        for raw in &raw_events[..count] {
            events.push(decode(raw));
        }
        Ok(count)
    }

    fn pollable_fd(&self) -> Option<RawFd> {
        Some(self.epoll.0.as_raw_fd())
    }
}
