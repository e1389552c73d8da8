//! Tracing and diagnostics bootstrap for binaries and long-running hosts.
//!
//! The library itself only emits `tracing` events; embedding applications
//! decide where they go. These helpers install a sensible default
//! subscriber and miette's pretty panic reports.

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` when set; otherwise defaults to `info` with debug-level
/// detail for this crate. Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,billscope=debug"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init();
}

/// Install miette's panic hook for pretty panic reports.
pub fn init_diagnostics() {
    miette::set_panic_hook();
}
