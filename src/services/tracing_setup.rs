//! Tracing subscriber setup
//!
//! The extension runs inside an editor process whose stdout is not ours, so
//! logs go to a file. `RUST_LOG` refines the filter; DEBUG is the default.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber writing to `log_file_path`.
///
/// Returns false if the file could not be created or a subscriber was
/// already installed.
pub fn init_global(log_file_path: &Path) -> bool {
    let Ok(log_file) = File::create(log_file_path) else {
        return false;
    };
    build_subscriber(log_file).try_init().is_ok()
}

/// Build the subscriber used in production and in tests.
pub fn build_subscriber(log_file: File) -> impl tracing::Subscriber + Send + Sync {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::DEBUG.into())
        // Suppress per-connection noise from the HTTP stack
        .add_directive("ureq=info".parse().unwrap_or_else(|_| tracing::Level::INFO.into()))
        .add_directive("rustls=info".parse().unwrap_or_else(|_| tracing::Level::INFO.into()));

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}
