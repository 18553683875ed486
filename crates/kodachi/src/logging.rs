//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to `config.filter`.
///
/// Returns false if a global subscriber was already installed.
pub fn init(config: &LoggingConfig) -> bool {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
	tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
