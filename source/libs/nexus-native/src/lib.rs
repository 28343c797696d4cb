// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Native scheduler primitives consumed by the sync add-ons
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (wait/deadline, ticks, host backend) + tests/host_backend.rs
//!
//! PUBLIC API:
//!   - Platform trait: factory for the native mutex, semaphore and queue
//!   - RawMutex / RawSemaphore / RawQueue: blocking-with-timeout primitives
//!   - Wait enum: blocking behaviour of a call
//!   - Deadline: carries one timeout budget across several suspension points
//!   - Ticks / TickRate: scheduler tick conversions
//!   - Host (feature `backend-host`): parking_lot based platform for host builds
//!
//! DEPENDENCIES:
//!   - parking_lot: host backend mutex/condvar
//!   - thiserror: error enums (no_std)
//!   - log: creation diagnostics
//!
//! ADR: docs/adr/0001-sync-addons.md

#![cfg_attr(not(any(test, feature = "backend-host")), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use core::fmt;
use core::marker::PhantomData;
use core::time::Duration;

mod ticks;

#[cfg(feature = "backend-host")]
mod host;

#[cfg(feature = "backend-host")]
pub use host::{Host, HostMutex, HostQueue, HostSemaphore};
pub use ticks::{TickRate, Ticks};

/// Behaviour of a blocking call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until the operation completes.
    Blocking,
    /// Return immediately if no progress can be made.
    NonBlocking,
    /// Block until either the operation completes or the timeout expires.
    ///
    /// A zero timeout is a single immediate attempt.
    Timeout(Duration),
}

impl Wait {
    /// Maps a tick count onto a wait mode.
    ///
    /// `Ticks::MAX` blocks forever and `Ticks::ZERO` is a non-blocking attempt,
    /// mirroring the scheduler's own delay conventions.
    pub fn from_ticks(ticks: Ticks, rate: TickRate) -> Self {
        if ticks == Ticks::MAX {
            Self::Blocking
        } else if ticks == Ticks::ZERO {
            Self::NonBlocking
        } else {
            Self::Timeout(ticks.to_duration(rate))
        }
    }

    /// Error reported when this wait mode gives up.
    pub const fn expired(self) -> WaitError {
        match self {
            Self::NonBlocking => WaitError::WouldBlock,
            Self::Blocking | Self::Timeout(_) => WaitError::Timeout,
        }
    }
}

/// Outcome of a blocking call that did not complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// A non-blocking attempt could not make progress.
    #[error("operation would block")]
    WouldBlock,
    /// The requested timeout elapsed first.
    #[error("operation timed out")]
    Timeout,
}

/// Native primitive kinds, used to report creation failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// Binary mutex.
    Mutex,
    /// Counting (or binary) semaphore.
    Semaphore,
    /// Fixed-capacity blocking queue.
    Queue,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutex => f.write_str("mutex"),
            Self::Semaphore => f.write_str("semaphore"),
            Self::Queue => f.write_str("queue"),
        }
    }
}

/// The platform could not allocate a native primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to create native {primitive}")]
pub struct CreateError {
    /// Which primitive failed.
    pub primitive: Primitive,
}

impl CreateError {
    /// Creation failure for `primitive`.
    pub const fn new(primitive: Primitive) -> Self {
        Self { primitive }
    }
}

/// A send that did not complete; the item is handed back untouched.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("send rejected: {cause}")]
pub struct SendError<T> {
    /// The item that was not queued.
    pub item: T,
    /// Why the send gave up.
    pub cause: WaitError,
}

impl<T> SendError<T> {
    /// Recovers the rejected item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

/// Binary mutex. Priority inheritance is the platform's business.
pub trait RawMutex: Send + Sync {
    /// Takes the mutex, blocking according to `wait`.
    fn lock(&self, wait: Wait) -> Result<(), WaitError>;

    /// Releases a mutex taken by [`RawMutex::lock`].
    fn unlock(&self);
}

/// Counting semaphore; a binary semaphore is one with `max == 1`.
///
/// Unlike a mutex, a semaphore may be given by a different unit of execution
/// than the one that took it.
pub trait RawSemaphore: Send + Sync {
    /// Takes one unit, blocking according to `wait`.
    fn take(&self, wait: Wait) -> Result<(), WaitError>;

    /// Gives one unit back. Returns `false` when the count is already at its maximum.
    fn give(&self) -> bool;

    /// Current count.
    fn count(&self) -> u32;
}

/// Fixed-capacity FIFO queue transferring owned items.
pub trait RawQueue<T: Send>: Send + Sync {
    /// Appends `item`, blocking while the queue is full.
    fn send(&self, item: T, wait: Wait) -> Result<(), SendError<T>>;

    /// Removes the head item, blocking while the queue is empty.
    fn receive(&self, wait: Wait) -> Result<T, WaitError>;

    /// Returns a copy of the head item without removing it.
    fn peek(&self, wait: Wait) -> Result<T, WaitError>
    where
        T: Clone;

    /// Number of queued items.
    fn messages_waiting(&self) -> usize;

    /// Number of free slots.
    fn spaces_available(&self) -> usize;
}

/// Factory and time source for the native primitives of one scheduler.
pub trait Platform: 'static {
    /// Native binary mutex.
    type Mutex: RawMutex;
    /// Native counting semaphore.
    type Semaphore: RawSemaphore;
    /// Native blocking queue.
    type Queue<T: Send>: RawQueue<T>;

    /// Creates an unlocked mutex.
    fn create_mutex() -> Result<Self::Mutex, CreateError>;

    /// Creates a semaphore holding `initial` of at most `max` units.
    fn create_semaphore(max: u32, initial: u32) -> Result<Self::Semaphore, CreateError>;

    /// Creates a queue able to hold `capacity` items without further allocation.
    fn create_queue<T: Send>(capacity: usize) -> Result<Self::Queue<T>, CreateError>;

    /// Monotonic time since the scheduler started.
    fn uptime() -> Duration;

    /// Creates a binary semaphore, initially available when `given` is set.
    fn create_binary_semaphore(given: bool) -> Result<Self::Semaphore, CreateError> {
        Self::create_semaphore(1, u32::from(given))
    }
}

/// A single timeout budget shared by several consecutive suspension points.
///
/// Composite operations take more than one native primitive; each step asks
/// the deadline for what is left instead of reusing the caller's full timeout.
pub struct Deadline<P: Platform> {
    wait: Wait,
    started: Duration,
    _platform: PhantomData<fn() -> P>,
}

impl<P: Platform> Deadline<P> {
    /// Starts the budget now.
    pub fn start(wait: Wait) -> Self {
        let started = match wait {
            Wait::Timeout(_) => P::uptime(),
            Wait::Blocking | Wait::NonBlocking => Duration::ZERO,
        };
        Self { wait, started, _platform: PhantomData }
    }

    /// Wait mode for the next suspension point.
    pub fn remaining(&self) -> Wait {
        match self.wait {
            Wait::Timeout(budget) => {
                let spent = P::uptime().saturating_sub(self.started);
                Wait::Timeout(budget.saturating_sub(spent))
            }
            other => other,
        }
    }
}
