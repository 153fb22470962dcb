//! Cross-thread wakeup descriptor.
//!
//! A non-blocking self-pipe: producers write a byte to the write end to make
//! the read end poll readable, and the reactor thread drains the read end
//! once it runs. Signals coalesce naturally since a full pipe already means a
//! wakeup is pending.

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, RawFd};

/// Sets `O_NONBLOCK` on a descriptor, preserving its other flags.
pub(crate) fn set_nonblocking<F: AsFd>(fd: &F) -> io::Result<()> {
    let raw = fd.as_fd().as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(raw, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Self-pipe wakeup primitive.
///
/// `signal` may be called from any thread; `reset` belongs to the thread
/// that polls [`as_raw_fd`](Self::as_raw_fd) for read readiness.
#[derive(Debug)]
pub struct WakeupFd {
    read: File,
    write: File,
}

impl WakeupFd {
    /// Creates the pipe pair with both ends non-blocking.
    ///
    /// # Errors
    ///
    /// Returns any OS error from pipe creation or flag manipulation.
    pub fn new() -> io::Result<Self> {
        let (read, write) = unistd::pipe()?;
        set_nonblocking(&read)?;
        set_nonblocking(&write)?;
        Ok(Self {
            read: File::from(read),
            write: File::from(write),
        })
    }

    /// Makes the read end poll readable. Coalescing: when the pipe is full
    /// the wakeup is already pending and the write is dropped.
    ///
    /// # Errors
    ///
    /// Returns any OS error other than `WouldBlock`.
    pub fn signal(&self) -> io::Result<()> {
        match (&self.write).write(&[1u8]) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Consumes every pending signal so the read end stops polling readable.
    ///
    /// # Errors
    ///
    /// Returns any OS error other than `WouldBlock`.
    pub fn reset(&self) -> io::Result<()> {
        let mut scratch = [0u8; 64];
        loop {
            match (&self.read).read(&mut scratch) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// The descriptor to register for read readiness.
    #[must_use]
    pub fn as_raw_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }
}
