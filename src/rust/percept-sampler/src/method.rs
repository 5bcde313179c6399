// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// How the next index is drawn from a sample space.
///
/// Applies independently to condition sampling within a block and to block
/// sampling across blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleMethod {
    /// Cyclic walk through the space in ascending index order.
    Ascending,
    /// Cyclic walk through the space in descending index order.
    Descending,
    /// One shuffle per pass, consumed sequentially: every index appears
    /// exactly once before any repeats.
    #[default]
    RandomPermutation,
    /// Independent uniform draw on every call; no per-pass exhaustion
    /// guarantee.
    RandomWithReplacement,
}

impl SampleMethod {
    /// Whether a "pass" over the space is well-defined for this method.
    pub fn is_exhaustive(self) -> bool {
        !matches!(self, SampleMethod::RandomWithReplacement)
    }
}
