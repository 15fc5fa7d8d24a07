//! Structured logging helpers.
//!
//! Events go through `tracing` with the single target `rusty_pivot` and always carry an
//! `event` field (snake_case) plus a `component` field. The crate never installs a
//! subscriber; applications wire one up themselves.

/// Target for all crate log events.
pub(crate) const LOG_TARGET: &str = "rusty_pivot";

macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::logging::LOG_TARGET, $($field)*)
    };
}

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::logging::LOG_TARGET, $($field)*)
    };
}

macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::logging::LOG_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
