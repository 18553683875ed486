//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! [engine]
//! root_location_path = "/root"
//!
//! [traversal]
//! threads = 4      # 0 = available parallelism
//! evict = true
//!
//! [logging]
//! filter = "info"
//! ```
//!
//! Every key is optional.

use std::num::NonZeroUsize;
use std::path::Path;

use kodachi_geolib::GeolibOptions;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
	pub engine: EngineConfig,
	pub traversal: TraversalConfig,
	pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Location that exists in the implicit scene.
	pub root_location_path: String,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			root_location_path: GeolibOptions::default().root_location_path,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
	/// Worker threads; `0` uses the available parallelism.
	pub threads: usize,
	/// Evict cooked data after each location.
	pub evict: bool,
}

impl Default for TraversalConfig {
	fn default() -> Self {
		Self { threads: 0, evict: true }
	}
}

impl TraversalConfig {
	pub fn worker_threads(&self) -> usize {
		match self.threads {
			0 => std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1),
			n => n,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// `EnvFilter` directives, used when `RUST_LOG` is unset.
	pub filter: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self { filter: "info".to_owned() }
	}
}

impl RuntimeConfig {
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	pub fn geolib_options(&self) -> GeolibOptions {
		GeolibOptions {
			root_location_path: self.engine.root_location_path.clone(),
		}
	}
}
