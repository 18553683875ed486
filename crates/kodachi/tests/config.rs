use kodachi_runtime::{ConfigError, DEFAULT_HOST, Runtime, RuntimeConfig, Traversal, set_host};
use pretty_assertions::assert_eq;

#[test]
fn missing_keys_use_defaults() {
	let config = RuntimeConfig::from_toml_str("[traversal]\nthreads = 3\n").unwrap();
	assert_eq!(config.traversal.threads, 3);
	assert!(config.traversal.evict);
	assert_eq!(config.engine.root_location_path, "/root");
	assert_eq!(config.logging.filter, "info");
	assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
	assert!(RuntimeConfig::default().traversal.worker_threads() >= 1);
}

#[test]
fn load_reads_file_and_reports_errors() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("kodachi.toml");
	std::fs::write(
		&path,
		"[engine]\nroot_location_path = \"/world\"\n\n[traversal]\nthreads = 2\nevict = false\n\n[logging]\nfilter = \"kodachi_runtime=trace\"\n",
	)
	.unwrap();

	let config = RuntimeConfig::load(&path).unwrap();
	assert_eq!(config.engine.root_location_path, "/world");
	assert_eq!(config.traversal.worker_threads(), 2);
	assert!(!config.traversal.evict);
	assert_eq!(config.logging.filter, "kodachi_runtime=trace");

	let missing = dir.path().join("missing.toml");
	match RuntimeConfig::load(&missing) {
		Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
		other => panic!("expected an I/O error, got {other:?}"),
	}

	std::fs::write(&path, "[traversal]\nthreads = \"many\"\n").unwrap();
	assert!(matches!(RuntimeConfig::load(&path), Err(ConfigError::Toml(_))));
}

#[test]
fn runtime_applies_config() {
	set_host(&DEFAULT_HOST).unwrap();
	let config = RuntimeConfig::from_toml_str("[engine]\nroot_location_path = \"/world\"\n[traversal]\nthreads = 2\nevict = false\n").unwrap();
	let rt = Runtime::with_config(config.clone()).unwrap();
	assert_eq!(rt.root_location_path(), "/world");
	assert_eq!(rt.options().root_location_path, "/world");
	assert_eq!(rt.config(), &config);

	let mut txn = rt.create_transaction();
	let client = txn.create_client();
	let traversal = Traversal::new(client);
	assert_eq!(traversal.root_location_path(), "/world");
	assert_eq!(traversal.threads(), 2);
}

#[test]
fn logging_init_is_idempotent() {
	let config = RuntimeConfig::default();
	kodachi_runtime::logging::init(&config.logging);
	assert!(!kodachi_runtime::logging::init(&config.logging));
}
