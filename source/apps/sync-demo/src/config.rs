// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Demo configuration: optional TOML file, then command-line overrides.

use std::fs;
use std::path::Path;

use nexus_sync::{RwPolicy, TickRate};
use serde::Deserialize;

use crate::{DemoError, MAX_HOOKS};

/// Workload shape. Missing fields take the defaults below.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Emulated scheduler tick rate.
    pub tick_rate_hz: u32,
    /// Reader/writer admission policy.
    pub policy: RwPolicy,
    /// Capacity of the queue shared by readers and writers.
    pub queue_capacity: usize,
    /// Reader tasks.
    pub readers: usize,
    /// Writer tasks.
    pub writers: usize,
    /// Tick hooks toggled by the hook task.
    pub hooks: usize,
    /// Wall-clock run time before shutdown.
    pub run_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TickRate::DEFAULT.hz(),
            policy: RwPolicy::PreferWriter,
            queue_capacity: 20,
            readers: 5,
            writers: 2,
            hooks: 3,
            run_secs: 30,
        }
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self, DemoError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| DemoError::Io { path: path.to_path_buf(), source })?;
        let config: Self = toml::from_str(&raw)
            .map_err(|source| DemoError::Parse { path: path.to_path_buf(), source })?;
        log::debug!("loaded {}: {config:?}", path.display());
        Ok(config)
    }

    /// Rejects shapes the demo cannot run.
    pub fn validate(&self) -> Result<(), DemoError> {
        if self.readers == 0 && self.writers == 0 {
            return Err(DemoError::InvalidConfig("at least one reader or writer is required".into()));
        }
        if self.hooks > MAX_HOOKS {
            return Err(DemoError::InvalidConfig(format!("at most {MAX_HOOKS} hooks are supported")));
        }
        self.tick_rate().map(drop)
    }

    pub fn tick_rate(&self) -> Result<TickRate, DemoError> {
        TickRate::new(self.tick_rate_hz)
            .ok_or_else(|| DemoError::InvalidConfig("tick_rate_hz must be non-zero".into()))
    }
}
