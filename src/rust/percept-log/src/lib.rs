// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::sync::{atomic::AtomicBool, atomic::Ordering};

#[doc(hidden)]
pub use log as _log;

#[macro_export]
macro_rules! info {
    ($msg:literal, $($arg:tt)+) => {
        percept_log::_log::info!(target: concat!("percept::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        percept_log::_log::info!(target: concat!("percept::", module_path!()), $msg);
    };
}

#[macro_export]
macro_rules! warn {
    ($msg:literal, $($arg:tt)+) => {
        percept_log::_log::warn!(target: concat!("percept::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        percept_log::_log::warn!(target: concat!("percept::", module_path!()), $msg);
    };
}

/// Log a phase-transition trace at debug level if transition tracing is enabled.
///
/// Transition traces fire once per phase entry on the frame tick, so they are
/// gated behind a runtime flag instead of the compile-time log level.
#[macro_export]
macro_rules! trace_transition {
    ($msg:literal, $($arg:tt)+) => {
        if percept_log::is_transition_trace_enabled() {
            percept_log::_log::debug!(target: concat!("percept::", module_path!()), $msg, $($arg)+);
        }
    };
    ($msg:literal) => {
        if percept_log::is_transition_trace_enabled() {
            percept_log::_log::debug!(target: concat!("percept::", module_path!()), $msg);
        }
    };
}

static TRANSITION_TRACE_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_transition_trace_enabled() -> bool {
    TRANSITION_TRACE_ENABLED.load(Ordering::Acquire)
}

/// Initialize the logging.
///
/// Meant to be called once by the hosting process before the first experiment
/// starts. The concrete logger is whatever the host installed on the `log`
/// facade; this only arms the transition-trace channel.
pub fn init_logging(with_transition_trace: bool) {
    TRANSITION_TRACE_ENABLED.store(with_transition_trace, Ordering::Release);
}
