// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reader, writer and hook-toggling tasks.
//!
//! Readers and writers share one queue through the configured lock: writers
//! push a running counter under the writer lock, readers pull from it under
//! the reader lock. A separate task disables and re-enables the tick hooks
//! on a fixed schedule. Delays are tick counts of a nominal 1 kHz scheduler,
//! so a faster emulated tick rate compresses the whole run.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use nexus_sync::host::{AnyRwLock, BoundedQueue};
use nexus_sync::{ReadWriteLock, TickHandler, TickHook, TickRate, Ticks, Wait};

/// Longest uninterrupted sleep, so shutdown is noticed promptly.
const PAUSE_SLICE: Duration = Duration::from_millis(10);

const READ_HOLD_SECS: u64 = 3;
const WRITE_HOLD_SECS: u64 = 2;
const DEQUEUE_TIMEOUT_MS: u64 = 100;
const TOGGLE_EVERY_SECS: u64 = 3;

/// Tick handler that reports once per second of ticks.
#[derive(Debug)]
pub struct CountingHook {
    id: usize,
    every: u32,
    since_report: AtomicU32,
    runs: AtomicU64,
}

impl CountingHook {
    pub fn new(id: usize, rate: TickRate) -> Self {
        Self { id, every: rate.hz(), since_report: AtomicU32::new(0), runs: AtomicU64::new(0) }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

impl TickHandler for CountingHook {
    fn on_tick(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if self.since_report.fetch_add(1, Ordering::Relaxed) + 1 >= self.every {
            self.since_report.store(0, Ordering::Relaxed);
            log::info!("tick hook {} running", self.id);
        }
    }
}

/// Counters reported at shutdown.
#[derive(Debug, Default)]
pub struct Stats {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub produced: AtomicU64,
    pub consumed: AtomicU64,
    pub dropped: AtomicU64,
    pub toggles: AtomicU64,
}

/// State shared by every task of one run.
pub struct Workload<'a> {
    pub lock: &'a AnyRwLock,
    pub queue: &'a BoundedQueue<u32>,
    pub stats: &'a Stats,
    pub stop: &'a AtomicBool,
    pub rate: TickRate,
}

impl Workload<'_> {
    /// Sleeps for `ticks`; returns `false` if shutdown was requested meanwhile.
    fn pause(&self, ticks: Ticks) -> bool {
        let until = Instant::now() + ticks.to_duration(self.rate);
        loop {
            if self.stop.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= until {
                return true;
            }
            thread::sleep((until - now).min(PAUSE_SLICE));
        }
    }

    fn secs(&self, secs: u64) -> Ticks {
        Ticks::from_secs(secs, TickRate::DEFAULT)
    }

    /// Reader `id` (1-based); the first three poll every second, the rest every five.
    pub fn reader(&self, id: usize) {
        let period = self.secs(if id <= 3 { 1 } else { 5 });
        let dequeue_timeout = Ticks::from_ms(DEQUEUE_TIMEOUT_MS, TickRate::DEFAULT);
        let dequeue_wait = Wait::from_ticks(dequeue_timeout, self.rate);
        while self.pause(period) {
            let _scope = self.lock.read();
            log::info!("[R {id}] starting read");
            self.stats.reads.fetch_add(1, Ordering::Relaxed);
            if !self.pause(self.secs(READ_HOLD_SECS)) {
                break;
            }
            if !self.queue.is_empty() {
                let count = self.queue.count();
                match self.queue.dequeue(dequeue_wait) {
                    Ok(value) => {
                        self.stats.consumed.fetch_add(1, Ordering::Relaxed);
                        log::info!("[R {id}] count={count} val={value}");
                    }
                    Err(err) => log::debug!("[R {id}] dequeue: {err}"),
                }
            }
            log::info!("[R {id}] ending read");
        }
    }

    /// Writer `id` (1-based); waits `1 + id` seconds between writes.
    pub fn writer(&self, id: usize) {
        let period = self.secs(1 + id as u64);
        let mut next = 1u32;
        while self.pause(period) {
            let _scope = self.lock.write();
            log::info!("[W {id}] starting write");
            self.stats.writes.fetch_add(1, Ordering::Relaxed);
            if !self.pause(self.secs(WRITE_HOLD_SECS)) {
                break;
            }
            match self.queue.try_enqueue(next) {
                Ok(()) => {
                    self.stats.produced.fetch_add(1, Ordering::Relaxed);
                    next = next.wrapping_add(1);
                }
                Err(err) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("[W {id}] dropped {}: {}", err.item, err.cause);
                }
            }
            log::info!("[W {id}] ending write, count={}", self.queue.count());
        }
    }

    /// Walks the hooks through [`toggle_step`] every few seconds.
    pub fn toggler(&self, hooks: &[TickHook<CountingHook>]) {
        let mut step = 0usize;
        while self.pause(self.secs(TOGGLE_EVERY_SECS)) {
            let Some((index, enable)) = toggle_step(step, hooks.len()) else {
                return;
            };
            let hook = &hooks[index];
            if enable {
                log::info!("enabling hook {}", hook.handler().id());
                hook.enable();
            } else {
                log::info!("disabling hook {}", hook.handler().id());
                hook.disable();
            }
            self.stats.toggles.fetch_add(1, Ordering::Relaxed);
            step += 1;
        }
    }
}

/// Hook to flip at `step`: every hook is disabled in order, then re-enabled
/// in order, and the cycle repeats.
pub fn toggle_step(step: usize, hooks: usize) -> Option<(usize, bool)> {
    if hooks == 0 {
        return None;
    }
    let phase = step % (2 * hooks);
    Some((phase % hooks, phase >= hooks))
}
