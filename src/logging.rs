//! Diagnostic logging
//!
//! `tracing` events go to stderr. `DRAKE_LOG` takes an `EnvFilter` directive
//! and wins over the level derived from the command-line verbosity.

use crate::runner::Verbosity;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "DRAKE_LOG";

/// Default filter directive for a verbosity level
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Verbose => "drake=debug",
        Verbosity::Silent => "off",
        Verbosity::Quiet | Verbosity::Normal => "warn",
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .try_init();
}
