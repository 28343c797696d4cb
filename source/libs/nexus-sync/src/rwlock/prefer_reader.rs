// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reader-preferring strategy. Writers may starve under a steady reader stream.

use core::fmt;

use nexus_native::{Deadline, Platform, RawSemaphore, Wait, WaitError};

use super::{gate, ReadWriteLock, ReaderTally, RwPolicy, WriterFlag};
use crate::Result;

/// Readers enter whenever no writer holds the lock, even if writers are waiting.
pub struct PreferReader<P: Platform> {
    readers: ReaderTally<P>,
    resource: P::Semaphore,
    writer: WriterFlag,
}

impl<P: Platform> PreferReader<P> {
    pub fn new() -> Result<Self> {
        let lock = Self {
            readers: ReaderTally::new()?,
            resource: gate::<P>("rwlock resource semaphore")?,
            writer: WriterFlag::default(),
        };
        log::debug!("rwlock created ({})", lock.policy());
        Ok(lock)
    }
}

impl<P: Platform> ReadWriteLock for PreferReader<P> {
    fn try_reader_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        let deadline = Deadline::<P>::start(wait);
        self.readers.enter(&self.resource, &deadline)
    }

    fn reader_unlock(&self) {
        self.readers.leave(&self.resource);
    }

    fn try_writer_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        self.resource.take(wait)?;
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
        RwPolicy::PreferReader
    }
}

impl<P: Platform> fmt::Debug for PreferReader<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferReader")
            .field("readers", &self.reader_count())
            .field("write_locked", &self.is_write_locked())
            .finish()
    }
}
