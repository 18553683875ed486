//! Runs in its own process so no other test can install a host first.

use kodachi_runtime::{Runtime, RuntimeConfig, RuntimeError, host};

#[test]
fn runtime_requires_a_host() {
	assert!(host().is_none());
	assert!(matches!(Runtime::create(), Err(RuntimeError::HostNotSet)));
	assert!(matches!(Runtime::with_config(RuntimeConfig::default()), Err(RuntimeError::HostNotSet)));
}
