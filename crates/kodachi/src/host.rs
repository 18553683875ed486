//! Process-wide plugin host.
//!
//! The host supplies the operator types every runtime of the process can cook. It must
//! be installed once, before [`crate::Runtime::create`], and cannot be swapped later.

use std::sync::{Arc, OnceLock};

use kodachi_geolib::OpTypeRegistry;
use tracing::info;

use crate::error::HostError;

/// Version of the [`PluginHost`] suite this crate understands.
pub const HOST_API_VERSION: u32 = 1;

/// Function suite provided by the embedding application.
#[derive(Debug)]
pub struct PluginHost {
	pub api_version: u32,
	pub name: &'static str,
	/// Adds the host's operator types on top of the built-ins.
	pub register_op_types: fn(&mut OpTypeRegistry),
}

fn register_nothing(_: &mut OpTypeRegistry) {}

/// Host that provides only the built-in operator types.
pub static DEFAULT_HOST: PluginHost = PluginHost {
	api_version: HOST_API_VERSION,
	name: "kodachi",
	register_op_types: register_nothing,
};

struct InstalledHost {
	host: &'static PluginHost,
	registry: Arc<OpTypeRegistry>,
}

static HOST: OnceLock<InstalledHost> = OnceLock::new();

/// Installs `host`. Installing the same host again is a no-op.
pub fn set_host(host: &'static PluginHost) -> Result<(), HostError> {
	if host.api_version != HOST_API_VERSION {
		return Err(HostError::VersionMismatch {
			expected: HOST_API_VERSION,
			found: host.api_version,
		});
	}

	let installed = HOST.get_or_init(|| {
		let mut registry = OpTypeRegistry::with_builtins();
		(host.register_op_types)(&mut registry);
		info!(host = host.name, op_types = registry.names().len(), "plugin host set");
		InstalledHost {
			host,
			registry: Arc::new(registry),
		}
	});

	if std::ptr::eq(installed.host, host) {
		Ok(())
	} else {
		Err(HostError::AlreadySet {
			current: installed.host.name,
			requested: host.name,
		})
	}
}

/// The installed host, if any.
pub fn host() -> Option<&'static PluginHost> {
	HOST.get().map(|installed| installed.host)
}

pub(crate) fn registry() -> Option<Arc<OpTypeRegistry>> {
	HOST.get().map(|installed| Arc::clone(&installed.registry))
}
