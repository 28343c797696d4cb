// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host stand-in for the scheduler tick interrupt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use nexus_sync::{TickHookRegistry, TickRate};

/// Ticks of lag tolerated before the schedule is reset instead of caught up.
const MAX_LAG_TICKS: u32 = 50;

/// Calls [`TickHookRegistry::dispatch`] at a fixed rate on the current thread.
#[derive(Clone, Copy, Debug)]
pub struct HostTicker {
    period: Duration,
}

impl HostTicker {
    pub fn new(rate: TickRate) -> Self {
        Self { period: rate.period() }
    }

    /// Dispatches until `stop` is raised. Returns the number of ticks emitted.
    pub fn run<const N: usize>(&self, registry: &TickHookRegistry<'_, N>, stop: &AtomicBool) -> u64 {
        let mut ticks = 0u64;
        let mut next = Instant::now();
        while !stop.load(Ordering::Acquire) {
            registry.dispatch();
            ticks += 1;
            next += self.period;
            let now = Instant::now();
            if let Some(early) = next.checked_duration_since(now) {
                thread::sleep(early);
            } else if now - next > self.period * MAX_LAG_TICKS {
                log::debug!("ticker fell behind by {:?}, resetting schedule", now - next);
                next = now;
            }
        }
        ticks
    }
}
