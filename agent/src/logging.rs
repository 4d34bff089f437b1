//! Diagnostic tracing for the agent.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. The answer, the
//! verbose transcript and the usage summary go to stdout and are not
//! affected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`, or `agent=info` when `verbose` is set.
///
/// # Example
/// ```bash
/// RUST_LOG=agent=debug agent "fix the calculator"
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,agent=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
