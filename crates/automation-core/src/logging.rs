//! Tracing initialization shared by all three binaries.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber, honoring `RUST_LOG` if set and
/// falling back to `LOG_LEVEL`, then `info`.
///
/// Safe to call once per process; a second call is a programmer error and
/// is intentionally allowed to panic via `try_init`'s `Result` — callers in
/// `main` should not call this more than once.
pub fn init_default_tracing() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
