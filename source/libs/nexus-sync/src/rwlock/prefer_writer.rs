// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Writer-preferring strategy.
//!
//! The first pending writer closes `block_readers`; it stays closed until the
//! last pending writer has left, so readers arriving in between wait behind
//! every queued writer. Readers can starve under a steady writer stream.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use nexus_native::{Deadline, Platform, RawSemaphore, Wait, WaitError};

use super::{gate, Held, ReadWriteLock, ReaderTally, RwPolicy, WriterFlag};
use crate::{creation_failed, Result};

pub struct PreferWriter<P: Platform> {
    readers: ReaderTally<P>,
    write_lock: P::Mutex,
    /// Writers waiting for or holding `resource`.
    writers: AtomicUsize,
    block_readers: P::Semaphore,
    resource: P::Semaphore,
    writer: WriterFlag,
}

impl<P: Platform> PreferWriter<P> {
    pub fn new() -> Result<Self> {
        let write_lock =
            P::create_mutex().map_err(|err| creation_failed("rwlock writer mutex", err))?;
        let lock = Self {
            readers: ReaderTally::new()?,
            write_lock,
            writers: AtomicUsize::new(0),
            block_readers: gate::<P>("rwlock block-readers semaphore")?,
            resource: gate::<P>("rwlock resource semaphore")?,
            writer: WriterFlag::default(),
        };
        log::debug!("rwlock created ({})", lock.policy());
        Ok(lock)
    }

    /// Writers queued behind the current holder. Snapshot only.
    pub fn waiting_writers(&self) -> usize {
        let pending = self.writers.load(Ordering::Relaxed);
        pending.saturating_sub(usize::from(self.writer.is_set()))
    }

    fn join_writers(&self, deadline: &Deadline<P>) -> core::result::Result<(), WaitError> {
        let _held = Held::take(&self.write_lock, deadline.remaining())?;
        let writers = self.writers.load(Ordering::Relaxed);
        if writers == 0 {
            self.block_readers.take(deadline.remaining())?;
        }
        self.writers.store(writers + 1, Ordering::Relaxed);
        Ok(())
    }

    fn leave_writers(&self) {
        let _held = Held::acquire(&self.write_lock);
        let writers = self.writers.load(Ordering::Relaxed);
        debug_assert!(writers > 0);
        self.writers.store(writers - 1, Ordering::Relaxed);
        if writers == 1 {
            self.block_readers.give();
        }
    }
}

impl<P: Platform> ReadWriteLock for PreferWriter<P> {
    fn try_reader_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        let deadline = Deadline::<P>::start(wait);
        self.block_readers.take(deadline.remaining())?;
        let entered = self.readers.enter(&self.resource, &deadline);
        self.block_readers.give();
        entered
    }

    fn reader_unlock(&self) {
        self.readers.leave(&self.resource);
    }

    fn try_writer_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        let deadline = Deadline::<P>::start(wait);
        self.join_writers(&deadline)?;
        if let Err(err) = self.resource.take(deadline.remaining()) {
            self.leave_writers();
            return Err(err);
        }
        self.writer.set();
        Ok(())
    }

    fn writer_unlock(&self) {
        self.writer.clear();
        self.resource.give();
        self.leave_writers();
    }

    fn reader_count(&self) -> usize {
        self.readers.count()
    }

    fn is_write_locked(&self) -> bool {
        self.writer.is_set()
    }

    fn policy(&self) -> RwPolicy {
        RwPolicy::PreferWriter
    }
}

impl<P: Platform> fmt::Debug for PreferWriter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferWriter")
            .field("readers", &self.reader_count())
            .field("write_locked", &self.is_write_locked())
            .field("waiting_writers", &self.waiting_writers())
            .finish()
    }
}

#[cfg(all(test, feature = "backend-host"))]
mod tests {
    use super::*;
    use core::time::Duration;
    use nexus_native::Host;

    #[test]
    fn timed_out_writer_reopens_reader_gate() {
        let lock = PreferWriter::<Host>::new().unwrap();
        lock.reader_lock();
        assert_eq!(
            lock.try_writer_lock(Wait::Timeout(Duration::from_millis(10))),
            Err(WaitError::Timeout)
        );
        assert_eq!(lock.waiting_writers(), 0);
        lock.try_reader_lock(Wait::NonBlocking).unwrap();
        assert_eq!(lock.reader_count(), 2);
        lock.reader_unlock();
        lock.reader_unlock();
    }

    #[test]
    fn held_writer_is_not_counted_as_waiting() {
        let lock = PreferWriter::<Host>::new().unwrap();
        lock.writer_lock();
        assert!(lock.is_write_locked());
        assert_eq!(lock.waiting_writers(), 0);
        assert_eq!(lock.try_reader_lock(Wait::NonBlocking), Err(WaitError::WouldBlock));
        lock.writer_unlock();
        lock.try_reader_lock(Wait::NonBlocking).unwrap();
        lock.reader_unlock();
    }
}
