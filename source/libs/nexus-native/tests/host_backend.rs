//! CONTEXT: Cross-thread tests for the host emulation of native primitives
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 4 integration tests
//!
//! TEST_SCOPE:
//!   - Semaphores handed between threads (give by a non-owner)
//!   - Blocking receive woken by a producer
//!   - Blocking send woken by a consumer
//!   - Timeout bounded by the requested duration
//!
//! DEPENDENCIES:
//!   - nexus_native::Host: host platform
//!
//! ADR: docs/adr/0001-sync-addons.md
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nexus_native::{Host, Platform, RawQueue, RawSemaphore, Wait, WaitError};

#[test]
fn semaphore_given_by_other_thread_wakes_taker() {
    let sem = Arc::new(Host::create_binary_semaphore(false).unwrap());
    let giver = Arc::clone(&sem);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        assert!(giver.give());
    });
    sem.take(Wait::Blocking).unwrap();
    handle.join().unwrap();
    assert_eq!(sem.count(), 0);
}

#[test]
fn blocking_receive_wakes_on_send() {
    let queue = Arc::new(Host::create_queue::<u32>(2).unwrap());
    let producer = Arc::clone(&queue);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        producer.send(7, Wait::Blocking).unwrap();
    });
    assert_eq!(queue.receive(Wait::Blocking), Ok(7));
    handle.join().unwrap();
}

#[test]
fn blocking_send_wakes_on_receive() {
    let queue = Arc::new(Host::create_queue::<u32>(1).unwrap());
    queue.send(1, Wait::NonBlocking).unwrap();
    let consumer = Arc::clone(&queue);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        consumer.receive(Wait::Blocking).unwrap()
    });
    queue.send(2, Wait::Timeout(Duration::from_secs(5))).unwrap();
    assert_eq!(handle.join().unwrap(), 1);
    assert_eq!(queue.receive(Wait::NonBlocking), Ok(2));
}

#[test]
fn timeout_is_honoured() {
    let queue = Host::create_queue::<u32>(1).unwrap();
    let started = Instant::now();
    assert_eq!(queue.receive(Wait::Timeout(Duration::from_millis(30))), Err(WaitError::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(30));
}
