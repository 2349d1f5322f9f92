//! Tracing subscriber setup for the `handoff` binary

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a compact stderr subscriber
///
/// `RUST_LOG` wins over `level` when set. Logs go to stderr so command
/// output on stdout stays clean. Calling this twice is harmless; the second
/// call is ignored.
pub fn init(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}
