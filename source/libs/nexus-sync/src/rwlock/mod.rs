// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Reader/writer lock family built from native mutexes and semaphores
//! OWNERS: @runtime
//! PUBLIC API: ReadWriteLock, PreferReader, PreferWriter, Balanced, AnyRwLock, RwPolicy,
//!             ReaderScope, WriterScope, RwData
//! DEPENDS_ON: nexus-native (RawMutex, RawSemaphore, Deadline)
//! INVARIANTS: At most one writer; never a writer together with readers; counters only
//!             change while the owning native mutex is held; unlock without lock panics
//! ADR: docs/adr/0001-sync-addons.md
//!
//! Every strategy shares the same shape: a reader tally guarded by a native
//! mutex, and a binary `resource` semaphore taken by the first reader (for the
//! whole reader group) or by a single writer. The strategies differ only in
//! what a unit has to pass before it may compete for `resource`:
//!
//! | Strategy       | Gate in front of `resource`                                  |
//! |----------------|--------------------------------------------------------------|
//! | [`PreferReader`] | none; readers join an active group freely                  |
//! | [`PreferWriter`] | `block_readers`, closed by the first pending writer        |
//! | [`Balanced`]     | `turnstile`, passed in arrival order by readers and writers |
//!
//! Timed acquisition (`try_*_lock`) spends one [`Deadline`] across all gates
//! and undoes any partial progress when it runs out.

mod balanced;
mod prefer_reader;
mod prefer_writer;

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use nexus_native::{Deadline, Platform, RawMutex, RawSemaphore, Wait, WaitError};

pub use balanced::Balanced;
pub use prefer_reader::PreferReader;
pub use prefer_writer::PreferWriter;

use crate::{creation_failed, Result};

/// Common surface of every reader/writer strategy.
///
/// The `*_unlock` calls must pair with a successful lock call on the same
/// lock; unmatched unlocks are caller bugs and panic. Prefer the scoped
/// helpers ([`read`](Self::read), [`write`](Self::write)) which cannot
/// mismatch.
pub trait ReadWriteLock: Send + Sync {
    /// Acquires shared access, giving up according to `wait`.
    fn try_reader_lock(&self, wait: Wait) -> core::result::Result<(), WaitError>;

    /// Releases shared access.
    fn reader_unlock(&self);

    /// Acquires exclusive access, giving up according to `wait`.
    fn try_writer_lock(&self, wait: Wait) -> core::result::Result<(), WaitError>;

    /// Releases exclusive access.
    fn writer_unlock(&self);

    /// Readers currently holding the lock.
    fn reader_count(&self) -> usize;

    /// Whether a writer currently holds the lock.
    fn is_write_locked(&self) -> bool;

    /// Admission policy implemented by this lock.
    fn policy(&self) -> RwPolicy;

    /// Acquires shared access, blocking without limit.
    fn reader_lock(&self) {
        blocking(|wait| self.try_reader_lock(wait));
    }

    /// Acquires exclusive access, blocking without limit.
    fn writer_lock(&self) {
        blocking(|wait| self.try_writer_lock(wait));
    }

    /// Shared access released when the scope is dropped.
    fn read(&self) -> ReaderScope<'_, Self> {
        self.reader_lock();
        ReaderScope { lock: self }
    }

    /// Timed variant of [`read`](Self::read).
    fn try_read(&self, wait: Wait) -> core::result::Result<ReaderScope<'_, Self>, WaitError> {
        self.try_reader_lock(wait)?;
        Ok(ReaderScope { lock: self })
    }

    /// Exclusive access released when the scope is dropped.
    fn write(&self) -> WriterScope<'_, Self> {
        self.writer_lock();
        WriterScope { lock: self }
    }

    /// Timed variant of [`write`](Self::write).
    fn try_write(&self, wait: Wait) -> core::result::Result<WriterScope<'_, Self>, WaitError> {
        self.try_writer_lock(wait)?;
        Ok(WriterScope { lock: self })
    }
}

/// Runs a wait-aware operation until it succeeds in blocking mode.
fn blocking(mut op: impl FnMut(Wait) -> core::result::Result<(), WaitError>) {
    // A blocking native call only returns an error on spurious platform wakeups.
    while op(Wait::Blocking).is_err() {}
}

/// Shared access held until drop.
#[must_use = "the reader lock is released as soon as the scope is dropped"]
pub struct ReaderScope<'a, L: ReadWriteLock + ?Sized> {
    lock: &'a L,
}

impl<L: ReadWriteLock + ?Sized> Drop for ReaderScope<'_, L> {
    fn drop(&mut self) {
        self.lock.reader_unlock();
    }
}

/// Exclusive access held until drop.
#[must_use = "the writer lock is released as soon as the scope is dropped"]
pub struct WriterScope<'a, L: ReadWriteLock + ?Sized> {
    lock: &'a L,
}

impl<L: ReadWriteLock + ?Sized> Drop for WriterScope<'_, L> {
    fn drop(&mut self) {
        self.lock.writer_unlock();
    }
}

/// Data reachable only through a reader/writer lock.
pub struct RwData<T: ?Sized, L> {
    lock: L,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, L: Send> Send for RwData<T, L> {}
unsafe impl<T: ?Sized + Send + Sync, L: Sync> Sync for RwData<T, L> {}

impl<T, L: ReadWriteLock> RwData<T, L> {
    pub fn new(lock: L, data: T) -> Self {
        Self { lock, data: UnsafeCell::new(data) }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, L: ReadWriteLock> RwData<T, L> {
    pub fn read(&self) -> RwDataReadGuard<'_, T, L> {
        let scope = self.lock.read();
        // Shared access is held for the lifetime of the guard.
        RwDataReadGuard { data: unsafe { &*self.data.get() }, _scope: scope }
    }

    pub fn try_read(&self, wait: Wait) -> core::result::Result<RwDataReadGuard<'_, T, L>, WaitError> {
        let scope = self.lock.try_read(wait)?;
        Ok(RwDataReadGuard { data: unsafe { &*self.data.get() }, _scope: scope })
    }

    pub fn write(&self) -> RwDataWriteGuard<'_, T, L> {
        let scope = self.lock.write();
        // Exclusive access is held for the lifetime of the guard.
        RwDataWriteGuard { data: unsafe { &mut *self.data.get() }, _scope: scope }
    }

    pub fn try_write(&self, wait: Wait) -> core::result::Result<RwDataWriteGuard<'_, T, L>, WaitError> {
        let scope = self.lock.try_write(wait)?;
        Ok(RwDataWriteGuard { data: unsafe { &mut *self.data.get() }, _scope: scope })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Readers currently holding the data. Snapshot only.
    pub fn reader_count(&self) -> usize {
        self.lock.reader_count()
    }

    pub fn is_write_locked(&self) -> bool {
        self.lock.is_write_locked()
    }

    pub fn policy(&self) -> RwPolicy {
        self.lock.policy()
    }
}

pub struct RwDataReadGuard<'a, T: ?Sized, L: ReadWriteLock> {
    data: &'a T,
    _scope: ReaderScope<'a, L>,
}

impl<T: ?Sized, L: ReadWriteLock> Deref for RwDataReadGuard<'_, T, L> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data
    }
}

pub struct RwDataWriteGuard<'a, T: ?Sized, L: ReadWriteLock> {
    data: &'a mut T,
    _scope: WriterScope<'a, L>,
}

impl<T: ?Sized, L: ReadWriteLock> Deref for RwDataWriteGuard<'_, T, L> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data
    }
}

impl<T: ?Sized, L: ReadWriteLock> DerefMut for RwDataWriteGuard<'_, T, L> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

/// Admission policy of a reader/writer lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum RwPolicy {
    /// Readers join an active reader group even while writers wait.
    PreferReader,
    /// A pending writer stops new readers from entering.
    #[default]
    PreferWriter,
    /// Readers and writers are admitted in arrival order.
    Balanced,
}

impl RwPolicy {
    pub const ALL: [Self; 3] = [Self::PreferReader, Self::PreferWriter, Self::Balanced];

    pub const fn name(self) -> &'static str {
        match self {
            Self::PreferReader => "prefer-reader",
            Self::PreferWriter => "prefer-writer",
            Self::Balanced => "balanced",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|policy| policy.name() == name)
    }
}

impl fmt::Display for RwPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lock whose strategy is picked at construction, e.g. from configuration.
///
/// Each call is forwarded to the concrete strategy; there is no per-call
/// policy check inside the strategies themselves.
pub enum AnyRwLock<P: Platform> {
    PreferReader(PreferReader<P>),
    PreferWriter(PreferWriter<P>),
    Balanced(Balanced<P>),
}

macro_rules! forward {
    ($self:ident, $lock:ident => $call:expr) => {
        match $self {
            AnyRwLock::PreferReader($lock) => $call,
            AnyRwLock::PreferWriter($lock) => $call,
            AnyRwLock::Balanced($lock) => $call,
        }
    };
}

impl<P: Platform> AnyRwLock<P> {
    pub fn new(policy: RwPolicy) -> Result<Self> {
        Ok(match policy {
            RwPolicy::PreferReader => Self::PreferReader(PreferReader::new()?),
            RwPolicy::PreferWriter => Self::PreferWriter(PreferWriter::new()?),
            RwPolicy::Balanced => Self::Balanced(Balanced::new()?),
        })
    }
}

impl<P: Platform> ReadWriteLock for AnyRwLock<P> {
    fn try_reader_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        forward!(self, lock => lock.try_reader_lock(wait))
    }

    fn reader_unlock(&self) {
        forward!(self, lock => lock.reader_unlock())
    }

    fn try_writer_lock(&self, wait: Wait) -> core::result::Result<(), WaitError> {
        forward!(self, lock => lock.try_writer_lock(wait))
    }

    fn writer_unlock(&self) {
        forward!(self, lock => lock.writer_unlock())
    }

    fn reader_count(&self) -> usize {
        forward!(self, lock => lock.reader_count())
    }

    fn is_write_locked(&self) -> bool {
        forward!(self, lock => lock.is_write_locked())
    }

    fn policy(&self) -> RwPolicy {
        forward!(self, lock => lock.policy())
    }
}

impl<P: Platform> fmt::Debug for AnyRwLock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        forward!(self, lock => fmt::Debug::fmt(lock, f))
    }
}

/// Native mutex held until drop.
struct Held<'a, M: RawMutex>(&'a M);

impl<'a, M: RawMutex> Held<'a, M> {
    fn take(mutex: &'a M, wait: Wait) -> core::result::Result<Self, WaitError> {
        mutex.lock(wait)?;
        Ok(Self(mutex))
    }

    fn acquire(mutex: &'a M) -> Self {
        blocking(|wait| mutex.lock(wait));
        Self(mutex)
    }
}

impl<M: RawMutex> Drop for Held<'_, M> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}

/// Reader count plus the mutex that guards it.
///
/// The first reader of a group takes `resource` for everyone; the last one
/// out gives it back.
struct ReaderTally<P: Platform> {
    mutex: P::Mutex,
    readers: AtomicUsize,
}

impl<P: Platform> ReaderTally<P> {
    fn new() -> Result<Self> {
        let mutex = P::create_mutex().map_err(|err| creation_failed("rwlock reader mutex", err))?;
        Ok(Self { mutex, readers: AtomicUsize::new(0) })
    }

    fn enter(
        &self,
        resource: &P::Semaphore,
        deadline: &Deadline<P>,
    ) -> core::result::Result<(), WaitError> {
        let _held = Held::take(&self.mutex, deadline.remaining())?;
        let readers = self.readers.load(Ordering::Relaxed);
        if readers == 0 {
            resource.take(deadline.remaining())?;
        }
        self.readers.store(readers + 1, Ordering::Relaxed);
        Ok(())
    }

    fn leave(&self, resource: &P::Semaphore) {
        let _held = Held::acquire(&self.mutex);
        let readers = self.readers.load(Ordering::Relaxed);
        assert!(readers > 0, "reader_unlock without a matching reader_lock");
        self.readers.store(readers - 1, Ordering::Relaxed);
        if readers == 1 {
            let released = resource.give();
            debug_assert!(released, "rwlock resource given twice");
        }
    }

    fn count(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }
}

/// Tracks the writer currently holding `resource`.
#[derive(Default)]
struct WriterFlag(AtomicBool);

impl WriterFlag {
    fn set(&self) {
        let was_held = self.0.swap(true, Ordering::AcqRel);
        debug_assert!(!was_held, "two writers inside the lock");
    }

    fn clear(&self) {
        assert!(self.0.swap(false, Ordering::AcqRel), "writer_unlock without a matching writer_lock");
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Binary semaphore handed between units; starts available.
fn gate<P: Platform>(what: &'static str) -> Result<P::Semaphore> {
    P::create_binary_semaphore(true).map_err(|err| creation_failed(what, err))
}

#[cfg(all(test, feature = "backend-host"))]
mod tests {
    use super::*;
    use nexus_native::Host;
    use std::time::Duration;

    #[test]
    fn policy_names_roundtrip() {
        for policy in RwPolicy::ALL {
            assert_eq!(RwPolicy::from_name(policy.name()), Some(policy));
        }
        assert_eq!(RwPolicy::from_name("fifo"), None);
        assert_eq!(RwPolicy::default(), RwPolicy::PreferWriter);
    }

    #[test]
    fn any_lock_reports_its_policy() {
        for policy in RwPolicy::ALL {
            let lock = AnyRwLock::<Host>::new(policy).unwrap();
            assert_eq!(lock.policy(), policy);
            let scope = lock.read();
            assert_eq!(lock.reader_count(), 1);
            drop(scope);
            let scope = lock.write();
            assert!(lock.is_write_locked());
            drop(scope);
            assert!(!lock.is_write_locked());
        }
    }

    #[test]
    fn rw_data_guards_release_on_drop() {
        let data = RwData::new(PreferWriter::<Host>::new().unwrap(), vec![1, 2]);
        {
            let mut guard = data.write();
            guard.push(3);
            assert!(data.is_write_locked());
        }
        {
            let first = data.read();
            let second = data.try_read(Wait::NonBlocking).unwrap();
            assert_eq!(first.len(), 3);
            assert_eq!(*second, vec![1, 2, 3]);
            assert_eq!(data.reader_count(), 2);
            assert!(data.try_write(Wait::Timeout(Duration::from_millis(5))).is_err());
        }
        assert_eq!(data.reader_count(), 0);
        assert_eq!(data.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn rw_data_exposes_state_but_not_the_lock() {
        let mut data = RwData::new(Balanced::<Host>::new().unwrap(), 0_u32);
        *data.get_mut() += 5;
        assert_eq!(data.policy(), RwPolicy::Balanced);
        let reader = data.read();
        assert_eq!(*reader, 5);
        assert_eq!(data.reader_count(), 1);
        assert!(!data.is_write_locked());
        assert!(data.try_write(Wait::NonBlocking).is_err());
        drop(reader);
        *data.try_write(Wait::NonBlocking).unwrap() += 1;
        assert_eq!(*data.read(), 6);
    }

    #[test]
    fn scope_released_on_early_return() {
        fn bail<L: ReadWriteLock>(lock: &L) -> core::result::Result<(), &'static str> {
            let _scope = lock.write();
            Err("bail out")
        }
        let lock = Balanced::<Host>::new().unwrap();
        assert!(bail(&lock).is_err());
        assert!(!lock.is_write_locked());
        lock.try_writer_lock(Wait::NonBlocking).unwrap();
        lock.writer_unlock();
    }
}
