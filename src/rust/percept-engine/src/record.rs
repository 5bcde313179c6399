// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::Serialize;

/// Field name of the per-record phase-transition event list.
pub const EVENT_FIELD: &str = "Event";

/// Field name of the sampled condition index; its presence marks a record
/// as a real condition test rather than preamble.
pub const COND_INDEX_FIELD: &str = "CondIndex";

/// One field of a condition-test record: either a plain value sequence or a
/// timestamped one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordField {
    Values(Vec<serde_json::Value>),
    Timed(Vec<(f64, serde_json::Value)>),
}

/// Append-only record of one condition test.
///
/// Born at each "new condition test" boundary, fed by whichever component
/// fires a synchronized event during its lifetime, and handed off unchanged
/// once flushed. Field order is append order, so exports read in the order
/// things happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConditionTestRecord {
    fields: IndexMap<String, RecordField>,
}

impl ConditionTestRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.get(name)
    }

    /// Append to a plain value field, creating it on first use.
    pub fn append_value(&mut self, name: &str, value: serde_json::Value) {
        match self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| RecordField::Values(Vec::new()))
        {
            RecordField::Values(values) => values.push(value),
            RecordField::Timed(_) => {
                log::warn!("record field `{name}` is timestamped; plain value dropped");
            }
        }
    }

    /// Append to a timestamped field, creating it on first use.
    pub fn append_timed(&mut self, name: &str, timestamp: f64, value: serde_json::Value) {
        match self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| RecordField::Timed(Vec::new()))
        {
            RecordField::Timed(values) => values.push((timestamp, value)),
            RecordField::Values(_) => {
                log::warn!("record field `{name}` holds plain values; timed value dropped");
            }
        }
    }

    /// Append one phase-transition event.
    pub fn append_event(&mut self, phase_name: &str, timestamp: f64) {
        self.append_timed(EVENT_FIELD, timestamp, serde_json::Value::from(phase_name));
    }

    /// The transition events recorded so far, as `(timestamp, phase name)`.
    pub fn events(&self) -> Vec<(f64, &str)> {
        match self.fields.get(EVENT_FIELD) {
            Some(RecordField::Timed(values)) => values
                .iter()
                .filter_map(|(ts, v)| v.as_str().map(|name| (*ts, name)))
                .collect(),
            _ => Vec::new(),
        }
    }
}
