// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde_json::json;

use percept_common::FactorTarget;
use percept_design::DesignTable;
use percept_sampler::{CondSampler, SampleMethod, SampleOptions};
use percept_units::duration::{Duration, Milliseconds};

use crate::config::{EngineConfig, PushPoint};
use crate::coordinator::PushRecordCoordinator;
use crate::error::{Error, Result};
use crate::interface::{ExperimentTimer, InstantTimer, RecordStatus, Recorder, SyncSink};
use crate::phase::{Enter, Level, Phase, PhaseTrack, phase_name};
use crate::record::ConditionTestRecord;

/// Called after every phase entry with the level, the phase and the onset.
pub type PhaseHook = Box<dyn FnMut(Level, Phase, Duration<Milliseconds>)>;

/// Externally observable run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Starting,
    Running,
    Stopping,
    /// All repeat quotas were met and the stop sequence has completed.
    Finished,
}

/// Start/stop sequencing with named suspension points.
///
/// Flipping the active state waits a fixed number of frames and then a
/// display-latency settle, resumed tick by tick; nothing blocks inside a
/// tick.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RunState {
    Idle,
    StartHold { frames_left: u32 },
    StartSettle { deadline: Duration<Milliseconds> },
    Running,
    StopHold { frames_left: u32 },
    StopSettle { deadline: Duration<Milliseconds> },
}

/// The hierarchical trial engine.
///
/// Three nested phase machines (block, trial, condition) advance once per
/// external frame tick, gated by elapsed-time holds against one monotonic
/// timer sample. The condition machine samples, pushes and records at its
/// configured entry points; completion is decided at the condition-level
/// repeat boundary.
pub struct TrialEngine {
    config: EngineConfig,
    sampler: CondSampler,
    coordinator: PushRecordCoordinator,
    timer: Box<dyn ExperimentTimer>,
    recorder: Option<Box<dyn Recorder>>,
    sync: Option<Box<dyn SyncSink>>,
    hook: Option<PhaseHook>,

    cond_track: PhaseTrack,
    trial_track: PhaseTrack,
    block_track: PhaseTrack,
    run: RunState,
    finished: bool,

    manual_cond: Option<usize>,
    manual_block: Option<usize>,
}

impl TrialEngine {
    pub fn builder(design: DesignTable) -> EngineBuilder {
        EngineBuilder::new(design)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sampler(&self) -> &CondSampler {
        &self.sampler
    }

    /// Mutable sampler access, e.g. to arm a sample skip after an aborted
    /// trial or to re-initialize counters before a resumed run.
    pub fn sampler_mut(&mut self) -> &mut CondSampler {
        &mut self.sampler
    }

    pub fn status(&self) -> EngineStatus {
        match self.run {
            RunState::Idle => {
                if self.finished {
                    EngineStatus::Finished
                } else {
                    EngineStatus::Idle
                }
            }
            RunState::StartHold { .. } | RunState::StartSettle { .. } => EngineStatus::Starting,
            RunState::Running => EngineStatus::Running,
            RunState::StopHold { .. } | RunState::StopSettle { .. } => EngineStatus::Stopping,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.run, RunState::Running)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Externally driven condition choice applied at every sample point
    /// until cleared.
    pub fn set_manual_condition(&mut self, index: Option<usize>) {
        self.manual_cond = index;
    }

    pub fn set_manual_block(&mut self, index: Option<usize>) {
        self.manual_block = index;
    }

    pub fn completed_records(&self) -> &[ConditionTestRecord] {
        self.coordinator.completed_records()
    }

    pub fn take_records(&mut self) -> Vec<ConditionTestRecord> {
        self.coordinator.take_records()
    }

    pub fn coordinator_mut(&mut self) -> &mut PushRecordCoordinator {
        &mut self.coordinator
    }

    /// Begin the start sequence. The engine reaches `Running` after the
    /// configured hold frames and latency settle have elapsed under `tick`.
    pub fn start(&mut self) -> Result<()> {
        if self.sampler.n_conditions() == 0 {
            return Err(Error::EmptyDesign);
        }
        if !matches!(self.run, RunState::Idle) {
            percept_log::warn!("start requested while not idle; ignored");
            return Ok(());
        }
        self.finished = false;
        self.timer.restart();
        if let Some(path) = self.config.record_path.clone() {
            self.recorder_call("set_record_path", |r| r.set_record_path(&path));
        }
        self.run = RunState::StartHold {
            frames_left: self.config.start_hold_frames,
        };
        percept_log::info!("experiment start sequence armed");
        Ok(())
    }

    /// Stop, legal at any point mid-phase: the partial record is flushed,
    /// all phase tracks reset to NONE, and the sampler counters are left
    /// as-is (a resumed run needs an explicit re-initialize).
    pub fn stop(&mut self) {
        if matches!(self.run, RunState::Idle) {
            return;
        }
        self.coordinator.flush_partial();
        self.cond_track.reset();
        self.trial_track.reset();
        self.block_track.reset();
        self.run = RunState::StopHold {
            frames_left: self.config.start_hold_frames,
        };
        percept_log::info!("experiment stop sequence armed");
    }

    /// Append a named synchronized value to the active record and mark it on
    /// the hardware sync channel.
    pub fn emit_sync(&mut self, name: &str, value: serde_json::Value) {
        let now = self.timer.elapsed();
        self.coordinator.record_timed(name, now, value);
        self.sync_pulse();
    }

    /// Advance the engine by one frame. The single `elapsed` sample taken
    /// here feeds every guard evaluated during this tick.
    pub fn tick(&mut self) -> Result<EngineStatus> {
        let now = self.timer.elapsed();
        match self.run {
            RunState::Idle => {}
            RunState::StartHold { frames_left } => {
                if frames_left == 0 {
                    self.run = RunState::StartSettle {
                        deadline: now + self.config.display_latency,
                    };
                } else {
                    self.run = RunState::StartHold {
                        frames_left: frames_left - 1,
                    };
                }
            }
            RunState::StartSettle { deadline } => {
                if now >= deadline {
                    self.recorder_call("start_record_and_acquire", |r| r.start_record_and_acquire());
                    self.recorder_call("set_record_status", |r| {
                        r.set_record_status(RecordStatus::Recording)
                    });
                    self.run = RunState::Running;
                    percept_log::info!("experiment running");
                    if self.advance(now)? {
                        self.finish();
                    }
                }
            }
            RunState::Running => {
                if self.advance(now)? {
                    self.finish();
                }
            }
            RunState::StopHold { frames_left } => {
                if frames_left == 0 {
                    self.run = RunState::StopSettle {
                        deadline: now + self.config.display_latency,
                    };
                } else {
                    self.run = RunState::StopHold {
                        frames_left: frames_left - 1,
                    };
                }
            }
            RunState::StopSettle { deadline } => {
                if now >= deadline {
                    self.recorder_call("set_record_status", |r| {
                        r.set_record_status(RecordStatus::Stopped)
                    });
                    self.recorder_call("stop_acquire_and_record", |r| r.stop_acquire_and_record());
                    self.timer.stop();
                    self.run = RunState::Idle;
                    percept_log::info!("experiment idle");
                }
            }
        }
        Ok(self.status())
    }

    fn finish(&mut self) {
        self.finished = true;
        percept_log::info!("all repeat quotas met; experiment finished");
        self.coordinator.flush_partial();
        self.cond_track.reset();
        self.trial_track.reset();
        self.block_track.reset();
        self.run = RunState::StopHold {
            frames_left: self.config.start_hold_frames,
        };
    }

    /// One running-state step over the level hierarchy, top down. Returns
    /// true when the experiment-completion boundary was hit.
    fn advance(&mut self, now: Duration<Milliseconds>) -> Result<bool> {
        if self.config.with_blocks {
            let durations = self.config.block_durations;
            match self.block_track.current() {
                Phase::None => {
                    self.enter_block_phase(Phase::Pre, now)?;
                    return Ok(false);
                }
                Phase::Pre => {
                    if self.block_track.hold(now) >= durations.pre {
                        self.enter_block_phase(Phase::Active, now)?;
                    }
                    return Ok(false);
                }
                Phase::Active => {
                    let block = self
                        .sampler
                        .block_index()
                        .expect("Internal error: block machine active without a sampled block");
                    let quota = self.config.cond_repeat * self.sampler.block_visit_count(block);
                    if self.sampler.is_all_conds_of_block_repeated(block, quota) {
                        self.enter_block_phase(Phase::Suf, now)?;
                        self.trial_track.reset();
                        self.cond_track.reset();
                        return Ok(false);
                    }
                }
                Phase::Suf => {
                    if self.block_track.hold(now) >= durations.suf {
                        self.enter_block_phase(Phase::None, now)?;
                    }
                    return Ok(false);
                }
            }
        }
        if self.config.with_trials {
            let durations = self.config.trial_durations;
            match self.trial_track.current() {
                Phase::None => {
                    self.enter_trial_phase(Phase::Pre, now)?;
                    return Ok(false);
                }
                Phase::Pre => {
                    if self.trial_track.hold(now) >= durations.pre {
                        self.enter_trial_phase(Phase::Active, now)?;
                    }
                    return Ok(false);
                }
                Phase::Active => {
                    if self.trial_track.hold(now) >= durations.active {
                        self.enter_trial_phase(Phase::Suf, now)?;
                        // The condition cycle restarts with the next trial.
                        self.cond_track.reset();
                        return Ok(false);
                    }
                }
                Phase::Suf => {
                    if self.trial_track.hold(now) >= durations.suf {
                        self.enter_trial_phase(Phase::None, now)?;
                    }
                    return Ok(false);
                }
            }
        }
        self.advance_condition(now)
    }

    fn advance_condition(&mut self, now: Duration<Milliseconds>) -> Result<bool> {
        let durations = self.config.cond_durations;
        match self.cond_track.current() {
            Phase::None => Ok(self.enter_cond_phase(Phase::Pre, now)? == Enter::Finished),
            Phase::Pre => {
                if self.cond_track.hold(now) >= durations.pre {
                    self.enter_cond_phase(Phase::Active, now)?;
                }
                Ok(false)
            }
            Phase::Active => {
                if self.cond_track.hold(now) >= durations.active {
                    let pack = self.config.pack_zero_ici
                        && durations.pre.is_zero()
                        && durations.suf.is_zero();
                    self.enter_cond_phase(Phase::Suf, now)?;
                    if pack {
                        // Atomic SUFICI→PREICI→COND: successive conditions
                        // present with no intervening tick.
                        match self.enter_cond_phase(Phase::Pre, now)? {
                            Enter::Finished => return Ok(true),
                            _ => {
                                self.enter_cond_phase(Phase::Active, now)?;
                            }
                        }
                    }
                }
                Ok(false)
            }
            Phase::Suf => {
                if self.cond_track.hold(now) >= durations.suf {
                    return Ok(self.enter_cond_phase(Phase::Pre, now)? == Enter::Finished);
                }
                Ok(false)
            }
        }
    }

    /// Condition-level transition. Entering PREICI is the unit-of-repeat
    /// boundary: with every quota met the entry is refused before any
    /// sampling or recording side effect fires.
    fn enter_cond_phase(&mut self, target: Phase, now: Duration<Milliseconds>) -> Result<Enter> {
        if self.cond_track.current() == target {
            return Ok(Enter::AlreadyIn);
        }
        if target == Phase::Pre {
            if self
                .sampler
                .is_cond_and_block_repeated(self.config.cond_repeat, self.config.block_repeat)
            {
                return Ok(Enter::Finished);
            }
            self.coordinator.new_condition_test();
            if self.config.push_point == PushPoint::PreIci {
                self.sample_and_push()?;
            }
        }
        if target == Phase::Active && self.config.push_point == PushPoint::Cond {
            self.sample_and_push()?;
        }
        self.apply_entry(Level::Condition, target, now);
        Ok(Enter::Entered)
    }

    fn enter_trial_phase(&mut self, target: Phase, now: Duration<Milliseconds>) -> Result<Enter> {
        if self.trial_track.current() == target {
            return Ok(Enter::AlreadyIn);
        }
        self.apply_entry(Level::Trial, target, now);
        Ok(Enter::Entered)
    }

    /// Block-level transition; PREIBI entry is where block sampling is
    /// (re)triggered and block factors are pushed.
    fn enter_block_phase(&mut self, target: Phase, now: Duration<Milliseconds>) -> Result<Enter> {
        if self.block_track.current() == target {
            return Ok(Enter::AlreadyIn);
        }
        if target == Phase::Pre {
            let block = self.sampler.sample_block_space(self.manual_block)?;
            let sampler = &self.sampler;
            let coordinator = &mut self.coordinator;
            let exclude = &self.config.exclude_factors;
            sampler.push_block(block, exclude, |name, value| {
                coordinator.push_value(name, value);
            });
            let block_repeat = self.sampler.current_block_repeat();
            self.coordinator.record_value("BlockIndex", json!(block));
            self.coordinator.record_value("BlockRepeat", json!(block_repeat));
        }
        self.apply_entry(Level::Block, target, now);
        Ok(Enter::Entered)
    }

    /// Draw the next condition, materialize it to targets and record the
    /// sampling state into the active record.
    fn sample_and_push(&mut self) -> Result<()> {
        let opts = SampleOptions {
            cond_repeat_target: self.config.cond_repeat,
            manual_cond_index: self.manual_cond,
            manual_block_index: self.manual_block,
            auto_sample_block: self.config.auto_sample_block && !self.config.with_blocks,
        };
        let index = self.sampler.sample_condition(&opts)?;

        let sampler = &self.sampler;
        let coordinator = &mut self.coordinator;
        let exclude = &self.config.exclude_factors;
        sampler.push_condition(
            index,
            self.config.include_block_factors_in_push,
            exclude,
            |name, value| coordinator.push_value(name, value),
        );

        let cond_repeat = self.sampler.current_cond_repeat();
        self.coordinator
            .record_value(crate::record::COND_INDEX_FIELD, json!(index));
        self.coordinator.record_value("CondRepeat", json!(cond_repeat));
        if self.sampler.n_blocks() > 1 {
            let block = self.sampler.block_index();
            let block_repeat = self.sampler.current_block_repeat();
            self.coordinator.record_value("BlockIndex", json!(block));
            self.coordinator.record_value("BlockRepeat", json!(block_repeat));
        }
        Ok(())
    }

    /// Shared tail of every actual entry: onset, transition event, optional
    /// hardware sync, entry hook.
    fn apply_entry(&mut self, level: Level, phase: Phase, now: Duration<Milliseconds>) {
        let track = match level {
            Level::Block => &mut self.block_track,
            Level::Trial => &mut self.trial_track,
            Level::Condition => &mut self.cond_track,
        };
        track.enter(phase, now);
        let name = phase_name(level, phase);
        self.coordinator.record_event(name, now);
        if self.config.sync_on_entry {
            self.sync_pulse();
        }
        percept_log::trace_transition!("entered {} at {} ms", name, now.value());
        if let Some(hook) = self.hook.as_mut() {
            hook(level, phase, now);
        }
    }

    fn sync_pulse(&mut self) {
        if let Some(sync) = self.sync.as_deref_mut()
            && let Err(err) = sync.bit_pulse(self.config.sync_channel, self.config.sync_pulse)
        {
            percept_log::warn!("sync pulse failed: {}; continuing", err);
        }
    }

    fn recorder_call(
        &mut self,
        what: &str,
        call: impl FnOnce(&mut dyn Recorder) -> anyhow::Result<()>,
    ) {
        if let Some(recorder) = self.recorder.as_deref_mut()
            && let Err(err) = call(recorder)
        {
            percept_log::warn!("recorder {} failed: {}; continuing", what, err);
        }
    }
}

/// Builds a [`TrialEngine`] from a design, a configuration and the external
/// capabilities the host provides.
pub struct EngineBuilder {
    design: Arc<DesignTable>,
    config: EngineConfig,
    block_factors: Vec<String>,
    cond_method: SampleMethod,
    block_method: SampleMethod,
    seed: Option<u64>,
    timer: Option<Box<dyn ExperimentTimer>>,
    recorder: Option<Box<dyn Recorder>>,
    sync: Option<Box<dyn SyncSink>>,
    targets: Vec<(String, Box<dyn FactorTarget>)>,
    default_target: Option<String>,
    routes: Vec<(String, String)>,
    hook: Option<PhaseHook>,
}

impl EngineBuilder {
    pub fn new(design: DesignTable) -> Self {
        EngineBuilder {
            design: Arc::new(design),
            config: EngineConfig::default(),
            block_factors: Vec::new(),
            cond_method: SampleMethod::default(),
            block_method: SampleMethod::Ascending,
            seed: None,
            timer: None,
            recorder: None,
            sync: None,
            targets: Vec::new(),
            default_target: None,
            routes: Vec::new(),
            hook: None,
        }
    }

    /// Build the design through a builder function, e.g. a closure around
    /// [`percept_design::ortho_combine`] or a file source.
    pub fn design_with(
        build: impl FnOnce() -> percept_design::Result<DesignTable>,
    ) -> percept_design::Result<Self> {
        Ok(Self::new(build()?))
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn block_factors(mut self, factors: Vec<String>) -> Self {
        self.block_factors = factors;
        self
    }

    pub fn cond_method(mut self, method: SampleMethod) -> Self {
        self.cond_method = method;
        self
    }

    pub fn block_method(mut self, method: SampleMethod) -> Self {
        self.block_method = method;
        self
    }

    /// Seed the sampling generator for a deterministic run.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn timer(mut self, timer: Box<dyn ExperimentTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn recorder(mut self, recorder: Box<dyn Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn sync_sink(mut self, sync: Box<dyn SyncSink>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn target(mut self, key: impl Into<String>, target: Box<dyn FactorTarget>) -> Self {
        self.targets.push((key.into(), target));
        self
    }

    pub fn default_target(mut self, key: impl Into<String>) -> Self {
        self.default_target = Some(key.into());
        self
    }

    pub fn route_factor(mut self, factor: impl Into<String>, target_key: impl Into<String>) -> Self {
        self.routes.push((factor.into(), target_key.into()));
        self
    }

    pub fn on_phase_entry(
        mut self,
        hook: impl FnMut(Level, Phase, Duration<Milliseconds>) + 'static,
    ) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> TrialEngine {
        let sampler = match self.seed {
            Some(seed) => CondSampler::with_seed(
                Arc::clone(&self.design),
                &self.block_factors,
                self.cond_method,
                self.block_method,
                seed,
            ),
            None => CondSampler::new(
                Arc::clone(&self.design),
                &self.block_factors,
                self.cond_method,
                self.block_method,
            ),
        };

        let mut coordinator = PushRecordCoordinator::new();
        for (key, target) in self.targets {
            coordinator.register_target(key, target);
        }
        if let Some(key) = self.default_target {
            coordinator.set_default_target(key);
        }
        for (factor, key) in self.routes {
            coordinator.route_factor(factor, key);
        }

        TrialEngine {
            config: self.config,
            sampler,
            coordinator,
            timer: self.timer.unwrap_or_else(|| Box::new(InstantTimer::new())),
            recorder: self.recorder,
            sync: self.sync,
            hook: self.hook,
            cond_track: PhaseTrack::new(),
            trial_track: PhaseTrack::new(),
            block_track: PhaseTrack::new(),
            run: RunState::Idle,
            finished: false,
            manual_cond: None,
            manual_block: None,
        }
    }
}
