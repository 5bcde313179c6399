// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use percept_units::duration::{Duration, Milliseconds};

/// The three nested levels of the trial hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Block,
    Trial,
    Condition,
}

/// The phase cycle shared by every level.
///
/// Each level names its phases differently (PREICI/COND/SUFICI at the
/// condition level, PREITI/TRIAL/SUFITI at the trial level, and so on); the
/// shape is identical, so one enum serves all three and the display names
/// come from [`phase_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    None,
    Pre,
    Active,
    Suf,
}

impl Phase {
    fn index(self) -> usize {
        match self {
            Phase::None => 0,
            Phase::Pre => 1,
            Phase::Active => 2,
            Phase::Suf => 3,
        }
    }
}

/// Display name of a phase at a given level, as recorded in condition-test
/// events.
pub fn phase_name(level: Level, phase: Phase) -> &'static str {
    match (level, phase) {
        (_, Phase::None) => "NONE",
        (Level::Condition, Phase::Pre) => "PREICI",
        (Level::Condition, Phase::Active) => "COND",
        (Level::Condition, Phase::Suf) => "SUFICI",
        (Level::Trial, Phase::Pre) => "PREITI",
        (Level::Trial, Phase::Active) => "TRIAL",
        (Level::Trial, Phase::Suf) => "SUFITI",
        (Level::Block, Phase::Pre) => "PREIBI",
        (Level::Block, Phase::Active) => "BLOCK",
        (Level::Block, Phase::Suf) => "SUFIBI",
    }
}

/// Result of a transition request. The transition function is total: every
/// state/target pair maps to one of these, there is no invalid-transition
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enter {
    /// The target equals the current phase; nothing happened.
    AlreadyIn,
    Entered,
    /// All repeat quotas are met; the entry was refused before any side
    /// effect and the run loop must stop.
    Finished,
}

/// Phase bookkeeping for one hierarchy level.
///
/// Records the onset timestamp once per entry; `hold` is the time spent in
/// the current phase, measured against the single elapsed-time sample the
/// tick provides.
#[derive(Debug, Clone, Default)]
pub struct PhaseTrack {
    current: Phase,
    onsets: [Option<Duration<Milliseconds>>; 4],
}

impl PhaseTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn onset(&self, phase: Phase) -> Option<Duration<Milliseconds>> {
        self.onsets[phase.index()]
    }

    /// Time spent in the current phase. Zero before the first entry.
    pub fn hold(&self, now: Duration<Milliseconds>) -> Duration<Milliseconds> {
        match self.onsets[self.current.index()] {
            Some(onset) => now.saturating_sub(onset),
            None => Duration::ZERO,
        }
    }

    /// Move to `phase`, recording its onset. Idempotent: re-entering the
    /// current phase reports [`Enter::AlreadyIn`] and records nothing.
    pub fn enter(&mut self, phase: Phase, now: Duration<Milliseconds>) -> Enter {
        if phase == self.current {
            return Enter::AlreadyIn;
        }
        self.current = phase;
        self.onsets[phase.index()] = Some(now);
        Enter::Entered
    }

    /// Back to `NONE` with no onset history, as at experiment start/stop.
    pub fn reset(&mut self) {
        *self = PhaseTrack::default();
    }
}
