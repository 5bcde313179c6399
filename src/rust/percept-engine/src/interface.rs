// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use percept_units::duration::{Duration, Milliseconds};
use percept_units::milliseconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Recording,
    Stopped,
}

/// Data-acquisition system driven across the start/stop sequence.
///
/// The engine never depends on a concrete acquisition vendor; hosts adapt
/// their hardware behind this capability. Failures are logged and the trial
/// sequence proceeds without the external effect.
pub trait Recorder {
    fn set_record_path(&mut self, path: &str) -> anyhow::Result<()>;
    fn start_record_and_acquire(&mut self) -> anyhow::Result<()>;
    fn stop_acquire_and_record(&mut self) -> anyhow::Result<()>;
    fn set_record_status(&mut self, status: RecordStatus) -> anyhow::Result<()>;
}

/// GPIO-style sink for hardware event marking.
pub trait SyncSink {
    fn bit_out(&mut self, channel: u8, high: bool) -> anyhow::Result<()>;
    fn bit_pulse(&mut self, channel: u8, width: Duration<Milliseconds>) -> anyhow::Result<()>;
}

/// The sole time source for hold computations.
///
/// Must be monotonic while running. `stop` freezes the reading; `restart`
/// rezeroes it. Multi-tick waits are not a timer concern: the engine's run
/// control suspends across ticks and compares against `elapsed`.
pub trait ExperimentTimer {
    fn elapsed(&self) -> Duration<Milliseconds>;
    fn restart(&mut self);
    fn stop(&mut self);
}

/// Wall-clock timer backed by `std::time::Instant`.
pub struct InstantTimer {
    origin: Instant,
    frozen: Option<Duration<Milliseconds>>,
}

impl InstantTimer {
    pub fn new() -> Self {
        InstantTimer {
            origin: Instant::now(),
            frozen: None,
        }
    }
}

impl Default for InstantTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentTimer for InstantTimer {
    fn elapsed(&self) -> Duration<Milliseconds> {
        match self.frozen {
            Some(at) => at,
            None => milliseconds(self.origin.elapsed().as_secs_f64() * 1e3),
        }
    }

    fn restart(&mut self) {
        self.origin = Instant::now();
        self.frozen = None;
    }

    fn stop(&mut self) {
        self.frozen = Some(self.elapsed());
    }
}

/// Hand-driven clock shared between a [`ManualTimer`] and the test or
/// headless host advancing it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<f64>>);

impl ManualClock {
    pub fn advance(&self, ms: f64) {
        self.0.set(self.0.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.0.set(ms);
    }

    pub fn now(&self) -> f64 {
        self.0.get()
    }
}

/// Deterministic timer for tests and simulated runs.
#[derive(Default)]
pub struct ManualTimer {
    clock: ManualClock,
    origin: f64,
    frozen: Option<f64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for advancing this timer's clock from outside.
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }
}

impl ExperimentTimer for ManualTimer {
    fn elapsed(&self) -> Duration<Milliseconds> {
        match self.frozen {
            Some(at) => milliseconds(at),
            None => milliseconds(self.clock.now() - self.origin),
        }
    }

    fn restart(&mut self) {
        self.origin = self.clock.now();
        self.frozen = None;
    }

    fn stop(&mut self) {
        self.frozen = Some(self.clock.now() - self.origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timer_follows_clock() {
        let mut timer = ManualTimer::new();
        let clock = timer.clock();
        assert_eq!(timer.elapsed(), milliseconds(0.0));

        clock.advance(120.0);
        assert_eq!(timer.elapsed(), milliseconds(120.0));

        timer.restart();
        assert_eq!(timer.elapsed(), milliseconds(0.0));
        clock.advance(30.0);
        assert_eq!(timer.elapsed(), milliseconds(30.0));

        timer.stop();
        clock.advance(1000.0);
        assert_eq!(timer.elapsed(), milliseconds(30.0));
    }

    #[test]
    fn test_instant_timer_freezes_on_stop() {
        let mut timer = InstantTimer::new();
        timer.stop();
        let frozen = timer.elapsed();
        assert_eq!(timer.elapsed(), frozen);
    }
}
