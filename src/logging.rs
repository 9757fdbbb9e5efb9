//! Tracing setup for hosts that do not install their own subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init() -> bool {
    init_with_default("info")
}

/// Like [`init`] with a custom fallback filter directive.
pub fn init_with_default(default_filter: &str) -> bool {
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Starting gamecore v{}", env!("CARGO_PKG_VERSION"));
    }
    installed
}
