// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scheduler tick arithmetic.

use core::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Frequency of the scheduler tick interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// Common 1 kHz tick.
    pub const DEFAULT: Self = Self { hz: 1000 };

    /// Returns `None` for a zero frequency.
    pub const fn new(hz: u32) -> Option<Self> {
        if hz == 0 {
            None
        } else {
            Some(Self { hz })
        }
    }

    /// Ticks per second.
    pub const fn hz(self) -> u32 {
        self.hz
    }

    /// Wall-clock length of one tick.
    pub fn period(self) -> Duration {
        Ticks(1).to_duration(self)
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A count of scheduler ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    /// No ticks.
    pub const ZERO: Self = Self(0);
    /// Wait forever.
    pub const MAX: Self = Self(u64::MAX);

    /// Converts milliseconds, rounding down.
    pub fn from_ms(ms: u64, rate: TickRate) -> Self {
        let ticks = u128::from(ms) * u128::from(rate.hz) / 1000;
        Self(u64::try_from(ticks).unwrap_or(u64::MAX))
    }

    /// Converts whole seconds.
    pub fn from_secs(secs: u64, rate: TickRate) -> Self {
        Self(secs.saturating_mul(u64::from(rate.hz)))
    }

    /// Converts an arbitrary duration, rounding down.
    pub fn from_duration(duration: Duration, rate: TickRate) -> Self {
        let ticks = duration.as_nanos() * u128::from(rate.hz) / NANOS_PER_SEC;
        Self(u64::try_from(ticks).unwrap_or(u64::MAX))
    }

    /// Wall-clock length of this many ticks.
    pub fn to_duration(self, rate: TickRate) -> Duration {
        let nanos = u128::from(self.0) * NANOS_PER_SEC / u128::from(rate.hz);
        match u64::try_from(nanos) {
            Ok(nanos) => Duration::from_nanos(nanos),
            Err(_) => Duration::MAX,
        }
    }
}
