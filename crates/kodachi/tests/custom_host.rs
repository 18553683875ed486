use kodachi_attribute::{Attribute, GroupAttribute};
use kodachi_geolib::{CookContext, LocationData, OpType, OpTypeRegistry};
use kodachi_runtime::{DEFAULT_HOST, HOST_API_VERSION, HostError, PluginHost, Runtime, host, set_host};

/// Sets `stamped = 1` on every existing location.
struct Stamp;

impl OpType for Stamp {
	fn name(&self) -> &'static str {
		"Stamp"
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		let input = ctx.primary();
		if !input.exists() {
			return input.clone();
		}
		let mut out = input.to_builder();
		out.set_attr("stamped", 1);
		out.build()
	}
}

fn register_stamp(registry: &mut OpTypeRegistry) {
	registry.register(Stamp);
}

static STAMP_HOST: PluginHost = PluginHost {
	api_version: HOST_API_VERSION,
	name: "stamp",
	register_op_types: register_stamp,
};

static FUTURE_HOST: PluginHost = PluginHost {
	api_version: HOST_API_VERSION + 1,
	name: "future",
	register_op_types: register_stamp,
};

fn install() {
	set_host(&STAMP_HOST).unwrap();
}

#[test]
fn host_op_types_cook_next_to_builtins() {
	install();
	let rt = Runtime::create().unwrap();
	let types = rt.registered_op_types();
	assert!(types.iter().any(|t| t == "Stamp"));
	assert!(types.iter().any(|t| t == "ConstantOp"));

	let mut txn = rt.create_transaction();
	let constant = txn.create_op();
	txn.set_op_args(&constant, "ConstantOp", GroupAttribute::new([("value", Attribute::from(3))]));
	let stamp = txn.create_op();
	txn.set_op_args(&stamp, "Stamp", GroupAttribute::default());
	txn.set_op_inputs(&stamp, [constant]);
	let client = txn.create_client();
	txn.set_client_op(&client, &stamp);
	rt.commit(&mut txn).unwrap();

	let root = client.cook_location("/root", false).unwrap();
	assert_eq!(root.attr("stamped").int_value(), Some(1));
	assert_eq!(root.attr("value").int_value(), Some(3));
}

#[test]
fn host_cannot_be_replaced() {
	install();
	assert_eq!(set_host(&STAMP_HOST), Ok(()));
	assert_eq!(
		set_host(&DEFAULT_HOST),
		Err(HostError::AlreadySet {
			current: "stamp",
			requested: "kodachi",
		})
	);
	assert_eq!(host().map(|h| h.name), Some("stamp"));
}

#[test]
fn mismatched_api_version_is_rejected() {
	assert_eq!(
		set_host(&FUTURE_HOST),
		Err(HostError::VersionMismatch {
			expected: HOST_API_VERSION,
			found: HOST_API_VERSION + 1,
		})
	);
	assert_ne!(host().map(|h| h.name), Some("future"));
}
