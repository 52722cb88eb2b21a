//! Subscriber setup for the binary. The library only emits events.

use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Installs a global fmt subscriber filtered by `RUST_LOG`.
///
/// Defaults to `info`; `verbose` adds `pv_sizer=debug` for per-scenario
/// events. Output goes to stderr so CSV and report output on stdout stay
/// clean. Calling it twice is harmless: the second install is ignored.
pub fn init_logging(verbose: bool) {
    let mut filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if verbose {
        if let Ok(directive) = "pv_sizer=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
