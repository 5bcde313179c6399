// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod error;
pub mod method;
pub mod sampler;
pub mod spaces;

pub use error::{Result, SamplerError};
pub use method::SampleMethod;
pub use sampler::{CondSampler, SampleOptions};
pub use spaces::SampleSpaces;
