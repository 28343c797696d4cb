// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Binary entrypoint: load configuration, run the workload, print a summary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nexus_sync::RwPolicy;
use sync_demo::{DemoConfig, DemoError, Summary};

#[derive(Debug, Parser)]
#[command(name = "sync-demo", about = "Exercise reader/writer locks, tick hooks and the bounded queue")]
struct Cli {
    /// TOML configuration file; command-line flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Admission policy: prefer-reader, prefer-writer or balanced.
    #[arg(short, long, value_parser = parse_policy)]
    policy: Option<RwPolicy>,
    /// Emulated scheduler tick rate in Hz.
    #[arg(long)]
    tick_rate_hz: Option<u32>,
    /// Capacity of the shared queue.
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// Number of reader tasks.
    #[arg(long)]
    readers: Option<usize>,
    /// Number of writer tasks.
    #[arg(long)]
    writers: Option<usize>,
    /// Number of tick hooks to register and toggle.
    #[arg(long)]
    hooks: Option<usize>,
    /// Seconds to run before shutting down.
    #[arg(long)]
    run_secs: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<DemoConfig, DemoError> {
        let mut config = match &self.config {
            Some(path) => DemoConfig::load(path)?,
            None => DemoConfig::default(),
        };
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(hz) = self.tick_rate_hz {
            config.tick_rate_hz = hz;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(readers) = self.readers {
            config.readers = readers;
        }
        if let Some(writers) = self.writers {
            config.writers = writers;
        }
        if let Some(hooks) = self.hooks {
            config.hooks = hooks;
        }
        if let Some(secs) = self.run_secs {
            config.run_secs = secs;
        }
        Ok(config)
    }
}

fn parse_policy(name: &str) -> Result<RwPolicy, String> {
    RwPolicy::from_name(name).ok_or_else(|| format!("unknown policy `{name}`"))
}

fn report(summary: &Summary) {
    println!("ticks dispatched : {}", summary.ticks);
    println!("reads / writes   : {} / {}", summary.reads, summary.writes);
    println!(
        "queue            : {} produced, {} consumed, {} dropped, {} left",
        summary.produced, summary.consumed, summary.dropped, summary.left_in_queue
    );
    println!("hook toggles     : {}", summary.toggles);
    for (index, runs) in summary.hook_runs.iter().enumerate() {
        println!("hook {}           : {runs} callbacks", index + 1);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let result = Cli::parse().into_config().and_then(|config| sync_demo::run(&config));
    match result {
        Ok(summary) => {
            report(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
