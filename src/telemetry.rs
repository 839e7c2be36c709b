//! Logging setup for the `ledgerpay` binary.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Installs a `tracing` subscriber that writes to stderr.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` applies. Stdout is
/// left to the command output. Calling this more than once is a no-op.
pub fn init_tracing(default_level: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    });
}
