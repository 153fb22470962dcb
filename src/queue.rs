//! Bounded multi-producer buffer queue.
//!
//! The queue moves whole byte buffers from any number of producer threads to
//! a single draining thread. Pushes never block: a full queue is reported as
//! backpressure and the rejected buffer is handed back to the caller so no
//! bytes are lost. Once closed the queue rejects every further push while the
//! drainer can still empty what was accepted before.

use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;

/// Why a push was rejected. Both variants return the buffer to the caller.
#[derive(Debug, Error)]
pub enum TryPushError {
    /// The queue is at capacity. The caller may retry after a drain.
    #[error("queue is full")]
    Full(Vec<u8>),
    /// The queue was closed; no further buffers are accepted.
    #[error("queue is closed")]
    Closed(Vec<u8>),
}

impl TryPushError {
    /// Recovers the rejected buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        match self {
            Self::Full(buf) | Self::Closed(buf) => buf,
        }
    }
}

#[derive(Debug)]
struct Inner {
    buffers: VecDeque<Vec<u8>>,
    closed: bool,
}

/// A bounded FIFO of byte buffers shared between producers and one drainer.
#[derive(Debug)]
pub struct BoundedQueue {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl BoundedQueue {
    /// Creates a queue bounded at `capacity` buffers.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                buffers: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
        }
    }

    /// Attempts to enqueue a buffer without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TryPushError::Full`] when the queue is at capacity and
    /// [`TryPushError::Closed`] after [`close`](Self::close); both carry the
    /// rejected buffer back.
    pub fn try_push(&self, buffer: Vec<u8>) -> Result<(), TryPushError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TryPushError::Closed(buffer));
        }
        if inner.buffers.len() >= self.capacity {
            return Err(TryPushError::Full(buffer));
        }
        inner.buffers.push_back(buffer);
        Ok(())
    }

    /// Moves every queued buffer, in order, to the tail of `out`.
    ///
    /// Returns the number of buffers drained. Draining is permitted after
    /// close; it is how the remaining accepted data leaves the queue.
    pub fn drain_into(&self, out: &mut Vec<u8>) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.buffers.len();
        for buffer in inner.buffers.drain(..) {
            out.extend_from_slice(&buffer);
        }
        count
    }

    /// Closes the queue to further pushes. Idempotent.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of queued buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().buffers.len()
    }

    /// Whether the queue holds no buffers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().buffers.is_empty()
    }

    /// The fixed capacity in buffers.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drains_in_push_order() {
        let queue = BoundedQueue::new(4);
        queue.try_push(b"a".to_vec()).unwrap();
        queue.try_push(b"bc".to_vec()).unwrap();
        queue.try_push(b"d".to_vec()).unwrap();

        let mut out = Vec::new();
        let drained = queue.drain_into(&mut out);
        assert_eq!(drained, 3);
        assert_eq!(out, b"abcd");
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_rejects_and_returns_buffer() {
        let queue = BoundedQueue::new(2);
        queue.try_push(b"a".to_vec()).unwrap();
        queue.try_push(b"b".to_vec()).unwrap();

        let rejected = queue.try_push(b"c".to_vec());
        let Err(TryPushError::Full(buf)) = rejected else {
            panic!("expected Full, got {rejected:?}");
        };
        assert_eq!(buf, b"c");

        let mut out = Vec::new();
        queue.drain_into(&mut out);
        queue.try_push(buf).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn closed_queue_rejects_but_still_drains() {
        let queue = BoundedQueue::new(4);
        queue.try_push(b"kept".to_vec()).unwrap();
        queue.close();
        queue.close();
        assert!(queue.is_closed());

        let rejected = queue.try_push(b"late".to_vec());
        assert!(matches!(rejected, Err(TryPushError::Closed(_))));

        let mut out = Vec::new();
        assert_eq!(queue.drain_into(&mut out), 1);
        assert_eq!(out, b"kept");
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn zero_capacity_panics() {
        let _ = BoundedQueue::new(0);
    }

    #[test]
    fn concurrent_pushes_keep_per_producer_order() {
        let queue = Arc::new(BoundedQueue::new(64));
        let mut handles = Vec::new();
        for tag in 0u8..2 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for seq in 0u8..16 {
                    loop {
                        match queue.try_push(vec![tag, seq]) {
                            Ok(()) => break,
                            Err(TryPushError::Full(_)) => thread::yield_now(),
                            Err(other) => panic!("unexpected rejection: {other:?}"),
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut out = Vec::new();
        queue.drain_into(&mut out);
        assert_eq!(out.len(), 2 * 16 * 2);

        let mut last_seq = [None::<u8>; 2];
        for record in out.chunks_exact(2) {
            let (tag, seq) = (record[0] as usize, record[1]);
            if let Some(prev) = last_seq[tag] {
                assert!(seq > prev, "per-producer order violated");
            }
            last_seq[tag] = Some(seq);
        }
    }
}
