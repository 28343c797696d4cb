// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-tick callbacks dispatched from the scheduler tick
//! OWNERS: @runtime
//! INVARIANTS: Dispatch never blocks, allocates or takes a lock; hooks run in
//!             registration order; disabled hooks are skipped entirely
//!
//! Registration is append-only and serialized by a [`SpinLock`]. Each slot is
//! written once, then published by bumping `len` with release ordering, so
//! the dispatcher only ever observes fully initialized slots.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spin::Once;

use crate::{Error, Result, SpinLock};

/// Callback invoked once per tick while its hook is enabled.
///
/// Runs in interrupt context on the target: keep it short and non-blocking.
pub trait TickHandler: Sync {
    fn on_tick(&self);
}

impl<F: Fn() + Sync> TickHandler for F {
    fn on_tick(&self) {
        self()
    }
}

/// A handler plus its enable flag.
///
/// Hooks start enabled. Enabling or disabling is a single atomic store and is
/// observed no later than the next dispatch.
pub struct TickHook<H: ?Sized> {
    enabled: AtomicBool,
    handler: H,
}

impl<H> TickHook<H> {
    pub const fn new(handler: H) -> Self {
        Self { enabled: AtomicBool::new(true), handler }
    }

    pub const fn new_disabled(handler: H) -> Self {
        Self { enabled: AtomicBool::new(false), handler }
    }
}

impl<H: ?Sized> TickHook<H> {
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: TickHandler + ?Sized> TickHook<H> {
    fn run(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.handler.on_tick();
        true
    }
}

impl<H: ?Sized> fmt::Debug for TickHook<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHook").field("enabled", &self.is_enabled()).finish_non_exhaustive()
    }
}

/// Position of a hook in dispatch order.
pub type HookId = usize;

type Slot<'h> = Once<&'h TickHook<dyn TickHandler + 'h>>;

/// Fixed-capacity, append-only set of hooks.
///
/// Every hook must outlive the registry. Construct the registry and register
/// hooks before the tick source starts calling [`dispatch`](Self::dispatch);
/// late registration is still safe.
pub struct TickHookRegistry<'h, const N: usize> {
    slots: [Slot<'h>; N],
    len: AtomicUsize,
    registering: SpinLock<()>,
}

impl<'h, const N: usize> TickHookRegistry<'h, N> {
    const EMPTY: Slot<'h> = Once::new();

    pub const fn new() -> Self {
        Self { slots: [Self::EMPTY; N], len: AtomicUsize::new(0), registering: SpinLock::new(()) }
    }

    /// Appends `hook` to the dispatch order.
    pub fn register(&self, hook: &'h TickHook<dyn TickHandler + 'h>) -> Result<HookId> {
        let _registering = self.registering.lock();
        let id = self.len.load(Ordering::Relaxed);
        let Some(slot) = self.slots.get(id) else {
            log::warn!("tick hook registry full ({N} slots)");
            return Err(Error::RegistryFull { capacity: N });
        };
        slot.call_once(|| hook);
        self.len.store(id + 1, Ordering::Release);
        log::debug!("tick hook {id} registered (enabled: {})", hook.is_enabled());
        Ok(id)
    }

    /// Runs every enabled hook once, in registration order.
    ///
    /// Returns how many handlers ran.
    pub fn dispatch(&self) -> usize {
        let len = self.len.load(Ordering::Acquire);
        self.slots[..len]
            .iter()
            .filter_map(Once::get)
            .filter(|hook| hook.run())
            .count()
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for TickHookRegistry<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for TickHookRegistry<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHookRegistry")
            .field("len", &self.len())
            .field("capacity", &N)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn hooks_run_in_registration_order() {
        let order = SpinLock::new(Vec::new());
        let first = TickHook::new(|| order.lock().push(1));
        let second = TickHook::new(|| order.lock().push(2));
        let registry = TickHookRegistry::<4>::new();
        assert_eq!(registry.register(&first).unwrap(), 0);
        assert_eq!(registry.register(&second).unwrap(), 1);
        assert_eq!(registry.dispatch(), 2);
        assert_eq!(registry.dispatch(), 2);
        assert_eq!(*order.lock(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn disabled_hook_starts_silent() {
        let hits = AtomicU32::new(0);
        let hook = TickHook::new_disabled(|| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        let registry = TickHookRegistry::<1>::new();
        registry.register(&hook).unwrap();
        assert_eq!(registry.dispatch(), 0);
        hook.enable();
        assert_eq!(registry.dispatch(), 1);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn registry_reports_saturation() {
        let hook = TickHook::new(|| {});
        let registry = TickHookRegistry::<2>::default();
        registry.register(&hook).unwrap();
        registry.register(&hook).unwrap();
        assert_eq!(registry.register(&hook), Err(Error::RegistryFull { capacity: 2 }));
        assert_eq!(registry.len(), registry.capacity());
    }

    #[test]
    fn empty_registry_dispatches_nothing() {
        let registry = TickHookRegistry::<0>::new();
        assert!(registry.is_empty());
        assert_eq!(registry.dispatch(), 0);
    }
}
