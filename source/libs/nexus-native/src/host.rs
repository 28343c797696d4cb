// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host emulation of the native scheduler primitives
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - enum Host: Platform implementation for host builds and tests
//!   - struct HostMutex: binary mutex (parking_lot mutex + condvar)
//!   - struct HostSemaphore: counting semaphore
//!   - struct HostQueue<T>: fixed-capacity FIFO, storage reserved up front
//!
//! INVARIANTS:
//!   - Queue storage is allocated once at creation; send never grows it
//!   - Timeout(0) is a single attempt; Blocking never reports an error
//!
//! DEPENDENCIES:
//!   - parking_lot::{Mutex, Condvar}
//!   - once_cell::sync::Lazy: uptime epoch
//!
//! ADR: docs/adr/0001-sync-addons.md

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{CreateError, Platform, RawMutex, RawQueue, RawSemaphore, SendError, Wait, WaitError};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Host platform backed by `parking_lot`. Creation never fails.
#[derive(Debug)]
pub enum Host {}

impl Platform for Host {
    type Mutex = HostMutex;
    type Semaphore = HostSemaphore;
    type Queue<T: Send> = HostQueue<T>;

    fn create_mutex() -> Result<HostMutex, CreateError> {
        Ok(HostMutex::new())
    }

    fn create_semaphore(max: u32, initial: u32) -> Result<HostSemaphore, CreateError> {
        Ok(HostSemaphore::new(max, initial))
    }

    fn create_queue<T: Send>(capacity: usize) -> Result<HostQueue<T>, CreateError> {
        Ok(HostQueue::new(capacity))
    }

    fn uptime() -> Duration {
        EPOCH.elapsed()
    }
}

/// Parks on `cv` while `blocked` holds, honouring `wait`.
fn block_while<T>(
    cv: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    wait: Wait,
    blocked: impl Fn(&T) -> bool,
) -> Result<(), WaitError> {
    match wait {
        Wait::NonBlocking => {
            if blocked(&**guard) {
                return Err(WaitError::WouldBlock);
            }
        }
        Wait::Blocking => {
            while blocked(&**guard) {
                cv.wait(guard);
            }
        }
        Wait::Timeout(timeout) => {
            let Some(deadline) = Instant::now().checked_add(timeout) else {
                return block_while(cv, guard, Wait::Blocking, blocked);
            };
            while blocked(&**guard) {
                if cv.wait_until(guard, deadline).timed_out() && blocked(&**guard) {
                    log::trace!("host primitive wait timed out after {timeout:?}");
                    return Err(WaitError::Timeout);
                }
            }
        }
    }
    Ok(())
}

/// Binary mutex. Unlocking an unlocked mutex is a caller bug and panics.
#[derive(Debug, Default)]
pub struct HostMutex {
    locked: Mutex<bool>,
    released: Condvar,
}

impl HostMutex {
    /// Creates an unlocked mutex.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RawMutex for HostMutex {
    fn lock(&self, wait: Wait) -> Result<(), WaitError> {
        let mut locked = self.locked.lock();
        block_while(&self.released, &mut locked, wait, |locked| *locked)?;
        *locked = true;
        Ok(())
    }

    fn unlock(&self) {
        let mut locked = self.locked.lock();
        assert!(*locked, "native mutex released while not held");
        *locked = false;
        drop(locked);
        self.released.notify_one();
    }
}

/// Counting semaphore bounded by `max`.
#[derive(Debug)]
pub struct HostSemaphore {
    count: Mutex<u32>,
    max: u32,
    available: Condvar,
}

impl HostSemaphore {
    /// Creates a semaphore; `initial` is clamped to `max`.
    pub fn new(max: u32, initial: u32) -> Self {
        Self { count: Mutex::new(initial.min(max)), max, available: Condvar::new() }
    }
}

impl RawSemaphore for HostSemaphore {
    fn take(&self, wait: Wait) -> Result<(), WaitError> {
        let mut count = self.count.lock();
        block_while(&self.available, &mut count, wait, |count| *count == 0)?;
        *count -= 1;
        Ok(())
    }

    fn give(&self) -> bool {
        let mut count = self.count.lock();
        if *count >= self.max {
            return false;
        }
        *count += 1;
        drop(count);
        self.available.notify_one();
        true
    }

    fn count(&self) -> u32 {
        *self.count.lock()
    }
}

/// Fixed-capacity FIFO with blocking send/receive.
#[derive(Debug)]
pub struct HostQueue<T> {
    slots: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> HostQueue<T> {
    /// Reserves storage for `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }
}

impl<T: Send> RawQueue<T> for HostQueue<T> {
    fn send(&self, item: T, wait: Wait) -> Result<(), SendError<T>> {
        let mut slots = self.slots.lock();
        let capacity = self.capacity;
        if let Err(cause) = block_while(&self.not_full, &mut slots, wait, |slots| slots.len() >= capacity) {
            return Err(SendError { item, cause });
        }
        slots.push_back(item);
        drop(slots);
        self.not_empty.notify_one();
        Ok(())
    }

    fn receive(&self, wait: Wait) -> Result<T, WaitError> {
        let mut slots = self.slots.lock();
        block_while(&self.not_empty, &mut slots, wait, VecDeque::is_empty)?;
        let item = slots.pop_front().ok_or(wait.expired())?;
        drop(slots);
        self.not_full.notify_one();
        Ok(item)
    }

    fn peek(&self, wait: Wait) -> Result<T, WaitError>
    where
        T: Clone,
    {
        let mut slots = self.slots.lock();
        block_while(&self.not_empty, &mut slots, wait, VecDeque::is_empty)?;
        let item = slots.front().cloned().ok_or(wait.expired())?;
        drop(slots);
        // A peeker may have consumed the wakeup meant for a receiver.
        self.not_empty.notify_one();
        Ok(item)
    }

    fn messages_waiting(&self) -> usize {
        self.slots.lock().len()
    }

    fn spaces_available(&self) -> usize {
        self.capacity - self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutex_try_lock_reports_would_block() {
        let mutex = HostMutex::new();
        mutex.lock(Wait::Blocking).unwrap();
        assert_eq!(mutex.lock(Wait::NonBlocking), Err(WaitError::WouldBlock));
        assert_eq!(mutex.lock(Wait::Timeout(Duration::from_millis(5))), Err(WaitError::Timeout));
        mutex.unlock();
        mutex.lock(Wait::NonBlocking).unwrap();
    }

    #[test]
    #[should_panic(expected = "not held")]
    fn mutex_unlock_without_lock_panics() {
        HostMutex::new().unlock();
    }

    #[test]
    fn binary_semaphore_saturates() {
        let sem = Host::create_binary_semaphore(true).unwrap();
        assert!(!sem.give());
        sem.take(Wait::NonBlocking).unwrap();
        assert_eq!(sem.count(), 0);
        assert_eq!(sem.take(Wait::Timeout(Duration::ZERO)), Err(WaitError::Timeout));
        assert!(sem.give());
    }

    #[test]
    fn queue_reserves_capacity_up_front() {
        let queue = HostQueue::<u8>::new(4);
        assert!(queue.slots.lock().capacity() >= 4);
        assert_eq!(queue.spaces_available(), 4);
    }

    #[test]
    fn queue_send_hands_item_back_when_full() {
        let queue = HostQueue::new(1);
        queue.send(1u32, Wait::NonBlocking).unwrap();
        let err = queue.send(2, Wait::NonBlocking).unwrap_err();
        assert_eq!(err.item, 2);
        assert_eq!(err.cause, WaitError::WouldBlock);
        assert_eq!(queue.peek(Wait::NonBlocking), Ok(1));
        assert_eq!(queue.receive(Wait::NonBlocking), Ok(1));
        assert_eq!(queue.receive(Wait::NonBlocking), Err(WaitError::WouldBlock));
    }
}
