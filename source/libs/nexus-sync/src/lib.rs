// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Synchronization add-ons composed from native scheduler primitives
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + tests/{rwlock_policy,queue_fifo,tick_hooks}.rs
//!
//! PUBLIC API:
//!   - ReadWriteLock trait + PreferReader / PreferWriter / Balanced strategies
//!   - AnyRwLock / RwPolicy: policy chosen at construction time
//!   - ReaderScope / WriterScope / RwData: scoped acquisition
//!   - TickHook / TickHookRegistry: per-tick callbacks, lock-free dispatch
//!   - BoundedQueue: FIFO with capacity queries and timeouts
//!   - SpinLock: short non-suspending critical sections
//!
//! DEPENDENCIES:
//!   - nexus-native: Platform trait (mutex, semaphore, queue, uptime)
//!   - spin::Once: write-once hook slots
//!   - thiserror / log: errors and diagnostics
//!
//! INVARIANTS:
//!   - No allocation after construction on lock, queue or dispatch paths
//!   - Tick dispatch never blocks
//!
//! ADR: docs/adr/0001-sync-addons.md

#![cfg_attr(not(any(test, feature = "backend-host")), no_std)]
#![deny(clippy::all)]

pub mod queue;
pub mod rwlock;
pub mod spinlock;
pub mod tick_hook;

pub use nexus_native::{CreateError, Platform, Primitive, TickRate, Ticks, Wait, WaitError};
pub use queue::{BoundedQueue, EnqueueError};
pub use rwlock::{
    AnyRwLock, Balanced, PreferReader, PreferWriter, ReadWriteLock, ReaderScope, RwData,
    RwDataReadGuard, RwDataWriteGuard, RwPolicy, WriterScope,
};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use tick_hook::{HookId, TickHandler, TickHook, TickHookRegistry};

#[cfg(feature = "backend-host")]
pub use nexus_native::Host;

/// Result alias for construction and registration.
pub type Result<T> = core::result::Result<T, Error>;

/// Construction-time failures. Timeouts are reported as [`WaitError`] instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A native primitive backing the object could not be created.
    #[error("resource creation failed: {0}")]
    ResourceCreation(#[from] CreateError),
    /// Every tick hook slot is taken.
    #[error("tick hook registry full ({capacity} slots)")]
    RegistryFull {
        /// Fixed number of slots.
        capacity: usize,
    },
    /// Queues must hold at least one item.
    #[error("queue capacity must be non-zero")]
    InvalidCapacity,
}

pub(crate) fn creation_failed(what: &'static str, err: CreateError) -> Error {
    log::error!("{what}: {err}");
    Error::ResourceCreation(err)
}

/// Aliases bound to the host platform.
#[cfg(feature = "backend-host")]
pub mod host {
    use nexus_native::Host;

    /// Reader-preferring lock on the host platform.
    pub type PreferReader = crate::PreferReader<Host>;
    /// Writer-preferring lock on the host platform.
    pub type PreferWriter = crate::PreferWriter<Host>;
    /// Arrival-ordered lock on the host platform.
    pub type Balanced = crate::Balanced<Host>;
    /// Policy-selected lock on the host platform.
    pub type AnyRwLock = crate::AnyRwLock<Host>;
    /// Bounded queue on the host platform.
    pub type BoundedQueue<T> = crate::BoundedQueue<T, Host>;
}
