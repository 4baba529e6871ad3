//! Background services and external integrations
//!
//! Everything here deals with time, files, processes or the network, and
//! is driven from the extension's poll loop.

pub mod crash_report;
pub mod log_dirs;
pub mod self_update;
pub mod telemetry;
pub mod time_source;
pub mod timer;
pub mod tracing_setup;
