//! Telemetry initialization.
//!
//! Controlled by `RUST_LOG` (the standard `tracing-subscriber` env filter):
//! unset defaults to `info`-level human-readable logs on stderr. No OTLP
//! exporter is wired up here — there is no network-telemetry surface for a
//! local CLI to report to.

use tracing_subscriber::EnvFilter;

/// Initialize global logging for the process. Call once, at the top of
/// `main`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .ok();
}
