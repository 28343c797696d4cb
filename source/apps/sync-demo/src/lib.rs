// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host demonstration of the nexus-sync add-ons
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (config, ticker, workload) + tests/short_run.rs
//!
//! Runs reader and writer tasks sharing a bounded queue under a configurable
//! reader/writer policy, while an emulated tick source drives tick hooks that
//! a separate task disables and re-enables on a schedule.

pub mod config;
pub mod ticker;
pub mod workload;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use nexus_sync::host::{AnyRwLock, BoundedQueue};
use nexus_sync::{TickHook, TickHookRegistry};
use thiserror::Error;

pub use config::DemoConfig;
pub use ticker::HostTicker;
use workload::{CountingHook, Stats, Workload};

/// Slots in the demo's hook registry.
pub const MAX_HOOKS: usize = 8;

#[derive(Debug, Error)]
pub enum DemoError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for [`DemoConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Lock, queue or registry setup failed.
    #[error(transparent)]
    Sync(#[from] nexus_sync::Error),
}

/// What a run did, for the final report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub ticks: u64,
    pub reads: u64,
    pub writes: u64,
    pub produced: u64,
    pub consumed: u64,
    pub dropped: u64,
    pub toggles: u64,
    /// Callback count per hook, in registration order.
    pub hook_runs: Vec<u64>,
    pub left_in_queue: usize,
}

/// Runs the workload for `config.run_secs` and reports what happened.
pub fn run(config: &DemoConfig) -> Result<Summary, DemoError> {
    run_for(config, Duration::from_secs(config.run_secs))
}

/// [`run`] with an explicit wall-clock duration.
pub fn run_for(config: &DemoConfig, duration: Duration) -> Result<Summary, DemoError> {
    config.validate()?;
    let rate = config.tick_rate()?;
    let lock = AnyRwLock::new(config.policy)?;
    let queue = BoundedQueue::new(config.queue_capacity)?;
    let hooks: Vec<_> =
        (1..=config.hooks).map(|id| TickHook::new(CountingHook::new(id, rate))).collect();
    let registry = TickHookRegistry::<MAX_HOOKS>::new();
    for hook in &hooks {
        registry.register(hook)?;
    }

    log::info!(
        "running {} readers and {} writers under {} for {duration:?} at {} Hz",
        config.readers,
        config.writers,
        config.policy,
        rate.hz()
    );

    let stats = Stats::default();
    let stop = AtomicBool::new(false);
    let workload = Workload { lock: &lock, queue: &queue, stats: &stats, stop: &stop, rate };
    let ticker = HostTicker::new(rate);

    let ticks = thread::scope(|scope| {
        let workload = &workload;
        let ticking = scope.spawn(|| ticker.run(&registry, &stop));
        for id in 1..=config.readers {
            scope.spawn(move || workload.reader(id));
        }
        for id in 1..=config.writers {
            scope.spawn(move || workload.writer(id));
        }
        scope.spawn(|| workload.toggler(&hooks));

        thread::sleep(duration);
        stop.store(true, Ordering::Release);
        ticking.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    });

    let load = |counter: &std::sync::atomic::AtomicU64| counter.load(Ordering::Relaxed);
    Ok(Summary {
        ticks,
        reads: load(&stats.reads),
        writes: load(&stats.writes),
        produced: load(&stats.produced),
        consumed: load(&stats.consumed),
        dropped: load(&stats.dropped),
        toggles: load(&stats.toggles),
        hook_runs: hooks.iter().map(|hook| hook.handler().runs()).collect(),
        left_in_queue: queue.count(),
    })
}
