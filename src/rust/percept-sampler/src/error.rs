// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SamplerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// Sampling was requested from a block with no conditions. This only
    /// happens when the design compiled to zero conditions; callers are
    /// expected to check `n_conditions()` before starting to sample.
    #[error("block {block} has no conditions to sample")]
    SampleFromEmptyBlock { block: usize },

    #[error("index {index} is outside the {len} available {kind}s")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },
}
