//! Logging setup and the macro prelude used across the crate.

use ::tracing_subscriber::EnvFilter;

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

/// Install a stdout subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = ::tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
