// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DesignError>;

/// Failures while compiling a condition design.
///
/// All of these are fatal to the design being built, but recoverable at the
/// caller: a host may substitute an empty design and continue without
/// conditions rather than abort the whole run.
#[derive(Error, Debug)]
pub enum DesignError {
    #[error("factor `{factor}` has {len} levels where {expected} were expected")]
    RaggedColumns {
        factor: String,
        len: usize,
        expected: usize,
    },

    #[error("factor `{0}` exists in both designs")]
    ColumnCollision(String),

    #[error("factor with an empty name")]
    EmptyFactor,

    #[error("cannot read design source")]
    Io(#[from] std::io::Error),

    #[error("design source is not a mapping of factor names to level lists")]
    Parse(#[from] serde_json::Error),
}
