// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The compiled design has zero conditions. Foreseeable configuration
    /// mistake, checked before the run loop starts rather than surfacing as
    /// a sampling failure mid-trial.
    #[error("design has no conditions; nothing to run")]
    EmptyDesign,

    #[error(transparent)]
    Sampler(#[from] percept_sampler::SamplerError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}
