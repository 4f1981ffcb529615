//! Tracing subscriber setup for the `campus` binary.
//!
//! Logs go to stderr so that command output on stdout stays parseable.
//! `RUST_LOG` wins over the configured `[logging] level`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}
