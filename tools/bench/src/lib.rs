//! CONTEXT: Benchmark helpers for the sync add-ons
//! INTENT: Uncontended round trips through locks, queue and hook dispatch
//! DEPS: nexus-sync (host platform)
//! READINESS: Library; no service dependencies
//! TESTS: Round trips leave every primitive idle
use nexus_sync::host::BoundedQueue;
use nexus_sync::{ReadWriteLock, TickHookRegistry, Wait};

/// Acquires and releases shared access once.
pub fn read_round_trip<L: ReadWriteLock + ?Sized>(lock: &L) -> usize {
    let _scope = lock.read();
    lock.reader_count()
}

/// Acquires and releases exclusive access once.
pub fn write_round_trip<L: ReadWriteLock + ?Sized>(lock: &L) -> bool {
    let _scope = lock.write();
    lock.is_write_locked()
}

/// Pushes `item` and pops it back.
pub fn queue_round_trip(queue: &BoundedQueue<u64>, item: u64) -> Option<u64> {
    queue.enqueue(item, Wait::NonBlocking).ok()?;
    queue.dequeue(Wait::NonBlocking).ok()
}

/// One tick worth of dispatch.
pub fn tick<const N: usize>(registry: &TickHookRegistry<'_, N>) -> usize {
    registry.dispatch()
}
