// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod interface;
pub mod phase;
pub mod record;

pub use config::{EngineConfig, PhaseDurations, PushPoint};
pub use coordinator::PushRecordCoordinator;
pub use engine::{EngineBuilder, EngineStatus, TrialEngine};
pub use error::{Error, Result};
pub use interface::{
    ExperimentTimer, InstantTimer, ManualClock, ManualTimer, RecordStatus, Recorder, SyncSink,
};
pub use phase::{Enter, Level, Phase, PhaseTrack};
pub use record::{ConditionTestRecord, RecordField};
