//! Logging setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Otherwise only warnings are shown, or
/// everything from `info` up when `verbose` is set. Logs go to stderr so
/// command output on stdout stays machine-readable.
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "info,sqlx=warn"
    } else {
        "warn,sqlx=error"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    // Ignore the error if a subscriber is already installed (e.g. in tests).
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
