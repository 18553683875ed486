use std::fmt;
use std::sync::Arc;

use kodachi_attribute::{Attribute, GroupAttribute};
use rustc_hash::FxHashMap;

use crate::location::LocationData;
use crate::ops;

/// Inputs available to an op while it cooks one location.
pub struct CookContext<'a> {
	pub(crate) path: &'a str,
	pub(crate) root: &'a str,
	pub(crate) args: &'a Attribute,
	pub(crate) inputs: &'a [LocationData],
	pub(crate) implicit: &'a LocationData,
}

impl<'a> CookContext<'a> {
	/// Location being cooked.
	pub fn path(&self) -> &'a str {
		self.path
	}

	/// Root location path of the engine.
	pub fn root(&self) -> &'a str {
		self.root
	}

	pub fn args(&self) -> &'a Attribute {
		self.args
	}

	/// Number of connected inputs.
	pub fn input_count(&self) -> usize {
		self.inputs.len()
	}

	/// Input `index` cooked at the same path.
	pub fn input(&self, index: usize) -> Option<&'a LocationData> {
		self.inputs.get(index)
	}

	pub fn inputs(&self) -> &'a [LocationData] {
		self.inputs
	}

	/// First input, or the implicit scene when the op has none.
	pub fn primary(&self) -> &'a LocationData {
		self.inputs.first().unwrap_or(self.implicit)
	}
}

/// An operator implementation.
pub trait OpType: Send + Sync + 'static {
	/// Registered type name.
	fn name(&self) -> &'static str;

	/// Argument description, as returned by `describe_op`.
	fn describe(&self) -> GroupAttribute {
		GroupAttribute::new([("opType", Attribute::from(self.name()))])
	}

	/// Produces the op's output at `ctx.path()`.
	fn cook(&self, ctx: &CookContext<'_>) -> LocationData;
}

/// Name-indexed set of operator implementations shared by every engine of a process.
#[derive(Clone, Default)]
pub struct OpTypeRegistry {
	types: FxHashMap<String, Arc<dyn OpType>>,
}

impl fmt::Debug for OpTypeRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OpTypeRegistry").field("types", &self.names()).finish()
	}
}

impl OpTypeRegistry {
	/// Empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry pre-populated with the built-in op types.
	pub fn with_builtins() -> Self {
		let mut registry = Self::new();
		ops::register_builtins(&mut registry);
		registry
	}

	/// Registers `op_type`, returning the implementation it replaced.
	pub fn register(&mut self, op_type: impl OpType) -> Option<Arc<dyn OpType>> {
		self.types.insert(op_type.name().to_owned(), Arc::new(op_type))
	}

	pub fn get(&self, name: &str) -> Option<&Arc<dyn OpType>> {
		self.types.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.types.contains_key(name)
	}

	/// Registered names, sorted.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<_> = self.types.keys().cloned().collect();
		names.sort();
		names
	}

	pub fn describe(&self, name: &str) -> Option<GroupAttribute> {
		self.types.get(name).map(|t| t.describe())
	}
}
