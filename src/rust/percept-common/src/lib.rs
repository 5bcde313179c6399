// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod target;
pub mod types;

pub use target::{FactorTarget, MemoryTarget};
pub use types::FactorValue;
