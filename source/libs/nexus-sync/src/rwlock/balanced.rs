// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Arrival-ordered strategy.
//!
//! Every unit passes a single `turnstile` before competing for `resource`. A
//! writer keeps the turnstile while it waits for the readers ahead of it to
//! drain, so later arrivals of either kind queue behind it. Consecutive
//! readers still share the lock. Ordering between units blocked on the
//! turnstile follows the native semaphore's wake order.

use core::fmt;

use nexus_native::{Deadline, Platform, RawSemaphore, Wait, WaitError};

use super::{gate, ReadWriteLock, ReaderTally, RwPolicy, WriterFlag};
use crate::Result;

pub struct Balanced<P: Platform> {
    readers: ReaderTally<P>,
    turnstile: P::Semaphore,
    resource: P::Semaphore,
    writer: WriterFlag,
}

impl<P: Platform> Balanced<P> {
    pub fn new() -> Result<Self> {
        let lock = Self {
            readers: ReaderTally::new()?,
            turnstile: gate::<P>("rwlock turnstile semaphore")?,
            resource: gate::<P>("rwlock resource semaphore")?,
            writer: WriterFlag::default(),
        };
        log::debug!("rwlock created ({})", lock.policy());
        Ok(lock)
    }
}

impl<P: Platform> ReadWriteLock for Balanced<P> {
    fn try_reader_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        let deadline = Deadline::<P>::start(wait);
        self.turnstile.take(deadline.remaining())?;
        let entered = self.readers.enter(&self.resource, &deadline);
        self.turnstile.give();
        entered
    }

    fn reader_unlock(&self) {
        self.readers.leave(&self.resource);
    }

    fn try_writer_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        let deadline = Deadline::<P>::start(wait);
        self.turnstile.take(deadline.remaining())?;
        let taken = self.resource.take(deadline.remaining());
        self.turnstile.give();
        taken?;
        self.writer.set();
        Ok(())
    }

    fn writer_unlock(&self) {
        self.writer.clear();
        self.resource.give();
    }

    fn reader_count(&self) -> usize {
        self.readers.count()
    }

    fn is_write_locked(&self) -> bool {
        self.writer.is_set()
    }

    fn policy(&self) -> RwPolicy {
        RwPolicy::Balanced
    }
}

impl<P: Platform> fmt::Debug for Balanced<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Balanced")
            .field("readers", &self.reader_count())
            .field("write_locked", &self.is_write_locked())
            .finish()
    }
}
