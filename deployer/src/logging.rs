//! Diagnostic tracing for a deployment run.
//!
//! Every step function and `SystemRunner::run` carry an `#[instrument]` span,
//! so an event from a child process (spawn failure, timeout kill, truncated
//! output) is printed inside its step span, e.g.
//! `launch_service:run{program=yarn cwd=levanter}: command timed out, killing`.
//! The runner adds one `step finished` event per step with its outcome.
//!
//! The emoji progress lines come from `io/console`, not from here: they are
//! always printed and `RUST_LOG` does not affect them.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber. Call once, first thing in `main`.
///
/// `RUST_LOG` picks the level (default `warn`: timeouts, tolerated pull
/// failures, aborts). Use `RUST_LOG=deployer=debug` to see each spawned
/// command with its exit code.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
