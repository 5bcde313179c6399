// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;

use crate::types::FactorValue;

/// Consumer of sampled factor values.
///
/// Implemented by whatever materializes a factor level outside the engine: a
/// rendering parameter store, a pulse/waveform generator, a stimulation
/// device. Several heterogeneous targets may be registered with the push
/// coordinator and selected per factor.
///
/// A failing target must not stall the trial sequence; the engine logs the
/// error and proceeds without the external effect.
pub trait FactorTarget {
    fn set_value(&mut self, factor: &str, value: &FactorValue) -> anyhow::Result<()>;
}

/// In-memory target holding the last value pushed per factor.
///
/// Useful as the default target of headless hosts and in tests.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    values: IndexMap<String, FactorValue>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, factor: &str) -> Option<&FactorValue> {
        self.values.get(factor)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FactorTarget for MemoryTarget {
    fn set_value(&mut self, factor: &str, value: &FactorValue) -> anyhow::Result<()> {
        self.values.insert(factor.to_string(), value.clone());
        Ok(())
    }
}
