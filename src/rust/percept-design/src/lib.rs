// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod compile;
pub mod error;
pub mod source;
pub mod table;

pub use compile::{combine, decompose_index, ortho_combine};
pub use error::{DesignError, Result};
pub use source::{design_from_value, read_design};
pub use table::DesignTable;
