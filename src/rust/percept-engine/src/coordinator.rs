// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;

use percept_common::{FactorTarget, FactorValue};
use percept_units::duration::{Duration, Milliseconds};

use crate::record::ConditionTestRecord;

/// Routes sampled factor values to their consumers and keeps the
/// condition-test record stream.
///
/// One target is the default; individual factors may be routed elsewhere
/// (e.g. a laser power factor to a pulse generator while everything else
/// goes to the rendering store). Target failures are logged, never raised:
/// missing hardware must not distort the timing of the sequence itself.
#[derive(Default)]
pub struct PushRecordCoordinator {
    targets: IndexMap<String, Box<dyn FactorTarget>>,
    default_target: Option<String>,
    routes: IndexMap<String, String>,
    active: ConditionTestRecord,
    completed: Vec<ConditionTestRecord>,
}

impl PushRecordCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named target. The first registered target becomes the
    /// default route.
    pub fn register_target(&mut self, key: impl Into<String>, target: Box<dyn FactorTarget>) {
        let key = key.into();
        if self.default_target.is_none() {
            self.default_target = Some(key.clone());
        }
        self.targets.insert(key, target);
    }

    pub fn set_default_target(&mut self, key: impl Into<String>) {
        self.default_target = Some(key.into());
    }

    /// Route one factor to a specific target instead of the default.
    pub fn route_factor(&mut self, factor: impl Into<String>, target_key: impl Into<String>) {
        self.routes.insert(factor.into(), target_key.into());
    }

    /// Push one factor value to its routed target.
    pub fn push_value(&mut self, factor: &str, value: &FactorValue) {
        let key = self
            .routes
            .get(factor)
            .or(self.default_target.as_ref())
            .cloned();
        let Some(key) = key else {
            percept_log::warn!("no target registered; dropping push of `{}`", factor);
            return;
        };
        match self.targets.get_mut(&key) {
            Some(target) => {
                if let Err(err) = target.set_value(factor, value) {
                    percept_log::warn!(
                        "target `{}` rejected `{}`: {}; continuing without it",
                        key,
                        factor,
                        err
                    );
                }
            }
            None => {
                percept_log::warn!("factor `{}` routed to unknown target `{}`", factor, key);
            }
        }
    }

    /// Close the current record and start a fresh one. Called at every
    /// "new condition test" boundary.
    ///
    /// Only records holding a sampled condition flush here; phase events
    /// recorded before the first sample (trial/block preamble) stay and
    /// merge into the first real test.
    pub fn new_condition_test(&mut self) {
        if self.active.field(crate::record::COND_INDEX_FIELD).is_some() {
            self.completed.push(std::mem::take(&mut self.active));
        }
    }

    /// Force-flush a partially built record, as at experiment stop.
    pub fn flush_partial(&mut self) {
        if !self.active.is_empty() {
            self.completed.push(std::mem::take(&mut self.active));
        }
    }

    pub fn record_event(&mut self, phase_name: &str, now: Duration<Milliseconds>) {
        self.active.append_event(phase_name, now.value());
    }

    pub fn record_value(&mut self, field: &str, value: serde_json::Value) {
        self.active.append_value(field, value);
    }

    /// Append a named synchronized value with its timestamp.
    pub fn record_timed(&mut self, field: &str, now: Duration<Milliseconds>, value: serde_json::Value) {
        self.active.append_timed(field, now.value(), value);
    }

    pub fn active_record(&self) -> &ConditionTestRecord {
        &self.active
    }

    pub fn completed_records(&self) -> &[ConditionTestRecord] {
        &self.completed
    }

    /// Hand off the completed records, leaving the coordinator empty.
    pub fn take_records(&mut self) -> Vec<ConditionTestRecord> {
        std::mem::take(&mut self.completed)
    }
}
