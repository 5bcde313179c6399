// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use percept_units::duration::{Duration, Milliseconds};
use percept_units::milliseconds;

use crate::phase::Phase;

/// Configured durations for one level's phase cycle.
///
/// A zero duration does not skip the phase: it is still entered and its
/// events still fire, but the guard is satisfied on the next evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub pre: Duration<Milliseconds>,
    pub active: Duration<Milliseconds>,
    pub suf: Duration<Milliseconds>,
}

impl PhaseDurations {
    pub const fn new(pre: f64, active: f64, suf: f64) -> Self {
        PhaseDurations {
            pre: milliseconds(pre),
            active: milliseconds(active),
            suf: milliseconds(suf),
        }
    }

    pub fn of(&self, phase: Phase) -> Duration<Milliseconds> {
        match phase {
            Phase::None => Duration::ZERO,
            Phase::Pre => self.pre,
            Phase::Active => self.active,
            Phase::Suf => self.suf,
        }
    }
}

/// Phase entry at which the sampled condition is materialized to targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PushPoint {
    /// Sample and push on PREICI entry, ahead of stimulus onset.
    #[default]
    PreIci,
    /// Sample and push on COND entry.
    Cond,
}

/// Full parameterization of one experiment run.
///
/// What used to be a subclass per experiment — different push points, extra
/// phases, other design rules — is a value of this struct plus the optional
/// phase-entry hook on the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub cond_durations: PhaseDurations,
    pub trial_durations: PhaseDurations,
    pub block_durations: PhaseDurations,

    /// Completed repeats required of every condition.
    pub cond_repeat: usize,
    /// Full presentations required of every block.
    pub block_repeat: usize,

    pub push_point: PushPoint,
    /// With both ICI durations zero, fold SUFICI→PREICI→COND into one
    /// atomic step so consecutive conditions present without a gap tick.
    pub pack_zero_ici: bool,

    /// Run the trial-level machine around condition cycles.
    pub with_trials: bool,
    /// Run the block-level machine around trials.
    pub with_blocks: bool,
    /// Let the sampler advance blocks itself once a block's quota is met.
    /// Ignored while the block-level machine is running.
    pub auto_sample_block: bool,

    /// Frames to hold at experiment start/stop before the latency settle.
    pub start_hold_frames: u32,
    /// Display pipeline latency honored before flipping the active state.
    pub display_latency: Duration<Milliseconds>,

    /// Hardware event-marker channel and pulse width.
    pub sync_channel: u8,
    pub sync_pulse: Duration<Milliseconds>,
    /// Emit a hardware sync pulse on every phase entry.
    pub sync_on_entry: bool,

    /// Push block factors along with each condition instead of only at
    /// block boundaries.
    pub include_block_factors_in_push: bool,
    /// Factors never pushed to targets.
    pub exclude_factors: Vec<String>,

    /// Record path handed to the recorder at start.
    pub record_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cond_durations: PhaseDurations::new(250.0, 1000.0, 250.0),
            trial_durations: PhaseDurations::new(250.0, 5000.0, 250.0),
            block_durations: PhaseDurations::new(500.0, 0.0, 500.0),
            cond_repeat: 1,
            block_repeat: 1,
            push_point: PushPoint::default(),
            pack_zero_ici: false,
            with_trials: false,
            with_blocks: false,
            auto_sample_block: true,
            start_hold_frames: 3,
            display_latency: milliseconds(50.0),
            sync_channel: 0,
            sync_pulse: milliseconds(5.0),
            sync_on_entry: false,
            include_block_factors_in_push: false,
            exclude_factors: Vec::new(),
            record_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_by_phase() {
        let durations = PhaseDurations::new(100.0, 500.0, 200.0);
        assert_eq!(durations.of(Phase::Pre), milliseconds(100.0));
        assert_eq!(durations.of(Phase::Active), milliseconds(500.0));
        assert_eq!(durations.of(Phase::Suf), milliseconds(200.0));
        assert_eq!(durations.of(Phase::None), Duration::ZERO);
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = EngineConfig {
            cond_repeat: 5,
            pack_zero_ici: true,
            ..EngineConfig::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.cond_repeat, 5);
        assert!(back.pack_zero_ici);
        assert_eq!(back.cond_durations, config.cond_durations);
    }
}
