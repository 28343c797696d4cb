// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity FIFO on top of the native blocking queue.

use core::fmt;

use nexus_native::{Platform, RawQueue, SendError, Wait, WaitError};

use crate::{creation_failed, Error, Result};

/// Failed enqueue; carries the rejected item back to the caller.
pub type EnqueueError<T> = SendError<T>;

/// Strict FIFO holding at most `capacity` items.
///
/// Storage is reserved at construction. A failed enqueue or dequeue leaves the
/// queue untouched.
pub struct BoundedQueue<T: Send, P: Platform> {
    inner: P::Queue<T>,
    capacity: usize,
}

impl<T: Send, P: Platform> BoundedQueue<T, P> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        let inner =
            P::create_queue(capacity).map_err(|err| creation_failed("bounded queue", err))?;
        log::debug!("bounded queue created (capacity {capacity})");
        Ok(Self { inner, capacity })
    }

    /// Appends `item`, waiting for a free slot according to `wait`.
    pub fn enqueue(&self, item: T, wait: Wait) -> core::result::Result<(), EnqueueError<T>> {
        self.inner.send(item, wait).map_err(|err| {
            log::trace!("enqueue failed: {}", err.cause);
            err
        })
    }

    /// Removes the oldest item, waiting for one according to `wait`.
    pub fn dequeue(&self, wait: Wait) -> core::result::Result<T, WaitError> {
        self.inner.receive(wait).map_err(|err| {
            log::trace!("dequeue failed: {err}");
            err
        })
    }

    /// Non-blocking enqueue, safe to call from a tick hook.
    pub fn try_enqueue(&self, item: T) -> core::result::Result<(), EnqueueError<T>> {
        self.enqueue(item, Wait::NonBlocking)
    }

    /// Non-blocking dequeue.
    pub fn try_dequeue(&self) -> Option<T> {
        self.dequeue(Wait::NonBlocking).ok()
    }

    /// Copy of the oldest item, left in place.
    pub fn peek(&self, wait: Wait) -> core::result::Result<T, WaitError>
    where
        T: Clone,
    {
        self.inner.peek(wait)
    }

    pub fn count(&self) -> usize {
        self.inner.messages_waiting()
    }

    pub fn spaces_available(&self) -> usize {
        self.inner.spaces_available()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn is_full(&self) -> bool {
        self.spaces_available() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Send, P: Platform> fmt::Debug for BoundedQueue<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("count", &self.count())
            .field("capacity", &self.capacity)
            .finish()
    }
}
