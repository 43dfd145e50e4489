//! Logging setup for the compiler and its hosts.
//!
//! The filter comes from `RUST_LOG` when set. Output goes to stderr so it
//! never mixes with JSON written to stdout.

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize tracing with the default `info` filter.
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// Only the first call in a process has any effect. If the host already
/// installed a global subscriber, that one is kept.
pub fn init_with_filter(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
            .is_ok();

        if installed {
            debug!(version = env!("CARGO_PKG_VERSION"), "xtql logging initialized");
        }
    });
}
