use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

use kodachi_attribute::Attribute;
use kodachi_geolib::NativeOpId;

use crate::error::RuntimeError;
use crate::op_id::KodachiOpId;
use crate::runtime::{Runtime, RuntimeInner};

/// State fixed by the commit that first publishes an op.
#[derive(Debug)]
pub(crate) struct CommittedOp {
	pub(crate) native: NativeOpId,
	pub(crate) op_type: String,
	pub(crate) args: Attribute,
	pub(crate) inputs: Vec<Op>,
}

pub(crate) struct OpInner {
	id: KodachiOpId,
	runtime: Weak<RuntimeInner>,
	committed: OnceLock<CommittedOp>,
}

/// Shared handle to one node of the operator graph.
///
/// At most one `Op` object exists per [`KodachiOpId`] in a runtime; equality is handle
/// identity. An op's type, args and inputs are set once, by the commit that publishes
/// it, and never change afterwards.
#[derive(Clone)]
pub struct Op(Arc<OpInner>);

impl Op {
	pub(crate) fn new(id: KodachiOpId, runtime: Weak<RuntimeInner>) -> Self {
		Self(Arc::new(OpInner {
			id,
			runtime,
			committed: OnceLock::new(),
		}))
	}

	pub fn id(&self) -> KodachiOpId {
		self.0.id
	}

	/// Committed `(type, args)`, or `None` before the first commit.
	pub fn op_args(&self) -> Option<(&str, &Attribute)> {
		self.committed().map(|c| (c.op_type.as_str(), &c.args))
	}

	pub fn op_type(&self) -> Option<&str> {
		self.committed().map(|c| c.op_type.as_str())
	}

	/// Committed inputs; empty before the first commit.
	pub fn inputs(&self) -> &[Op] {
		self.committed().map(|c| c.inputs.as_slice()).unwrap_or(&[])
	}

	pub fn is_committed(&self) -> bool {
		self.0.committed.get().is_some()
	}

	/// The owning runtime, if it is still alive.
	pub fn runtime(&self) -> Result<Runtime, RuntimeError> {
		self.0.runtime.upgrade().map(Runtime::from_inner).ok_or(RuntimeError::Expired)
	}

	pub(crate) fn committed(&self) -> Option<&CommittedOp> {
		self.0.committed.get()
	}

	pub(crate) fn native_id(&self) -> Option<NativeOpId> {
		self.committed().map(|c| c.native)
	}

	pub(crate) fn publish(&self, state: CommittedOp) {
		let published = self.0.committed.set(state).is_ok();
		debug_assert!(published, "op {} published twice", self.id());
	}

	pub(crate) fn belongs_to(&self, runtime: *const RuntimeInner) -> bool {
		std::ptr::eq(self.0.runtime.as_ptr(), runtime)
	}

	pub(crate) fn ptr_eq(&self, other: &Op) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl PartialEq for Op {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl Eq for Op {}

impl Hash for Op {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.id.hash(state);
	}
}

impl fmt::Debug for Op {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("Op");
		s.field("id", &self.0.id);
		match self.committed() {
			Some(c) => s
				.field("op_type", &c.op_type)
				.field("native", &c.native)
				.field("inputs", &c.inputs.iter().map(Op::id).collect::<Vec<_>>()),
			None => s.field("committed", &false),
		};
		s.finish()
	}
}
