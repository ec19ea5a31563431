//! Diagnostic tracing to stderr
//!
//! stdout carries command output (and `--json` payloads); everything the
//! library logs goes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the default is `warn`, raised to
/// `debug` for wt's own crates with `--verbose` and lowered to `error`
/// with `--quiet`.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn default_directives(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "warn,wt=debug,wt_core=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    }
}
