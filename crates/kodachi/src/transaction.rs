use std::fmt;
use std::sync::Weak;

use indexmap::IndexMap;
use kodachi_attribute::Attribute;
use tracing::trace;

use crate::client::Client;
use crate::op::Op;
use crate::op_id::KodachiOpId;
use crate::runtime::{Runtime, RuntimeInner};

/// Staged graph edits, published atomically by [`Runtime::commit`].
///
/// Repeated writes to the same op or client before a commit replace each other.
/// A successful commit clears the transaction; a rejected one leaves it as it was.
pub struct Transaction {
	pub(crate) runtime: Weak<RuntimeInner>,
	pub(crate) new_ops: IndexMap<KodachiOpId, Op>,
	pub(crate) op_args: IndexMap<KodachiOpId, (Op, String, Attribute)>,
	pub(crate) op_inputs: IndexMap<KodachiOpId, (Op, Vec<Op>)>,
	pub(crate) client_ops: IndexMap<u64, (Client, Op)>,
}

impl fmt::Debug for Transaction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Transaction")
			.field("new_ops", &self.new_ops.len())
			.field("op_args", &self.op_args.len())
			.field("op_inputs", &self.op_inputs.len())
			.field("client_ops", &self.client_ops.len())
			.finish()
	}
}

impl Transaction {
	pub(crate) fn new(runtime: Weak<RuntimeInner>) -> Self {
		Self {
			runtime,
			new_ops: IndexMap::new(),
			op_args: IndexMap::new(),
			op_inputs: IndexMap::new(),
			client_ops: IndexMap::new(),
		}
	}

	/// Creates an op with a fresh id. It becomes visible to the runtime at commit.
	pub fn create_op(&mut self) -> Op {
		let id = KodachiOpId::generate();
		let op = Op::new(id, self.runtime.clone());
		self.new_ops.insert(id, op.clone());
		trace!(op_id = %id, "staged new op");
		op
	}

	/// The op named `id`: staged by this transaction, already committed, or newly
	/// created. `None` for the null id.
	pub fn get_or_create_op(&mut self, id: KodachiOpId) -> Option<Op> {
		if id.is_null() {
			return None;
		}
		if let Some(op) = self.new_ops.get(&id) {
			return Some(op.clone());
		}
		if let Some(runtime) = self.runtime.upgrade()
			&& let Some(op) = runtime.op_by_id(id)
		{
			return Some(op);
		}
		let op = Op::new(id, self.runtime.clone());
		self.new_ops.insert(id, op.clone());
		Some(op)
	}

	pub fn set_op_args(&mut self, op: &Op, op_type: impl Into<String>, args: impl Into<Attribute>) -> &mut Self {
		self.op_args.insert(op.id(), (op.clone(), op_type.into(), args.into()));
		self
	}

	pub fn set_op_inputs(&mut self, op: &Op, inputs: impl IntoIterator<Item = Op>) -> &mut Self {
		self.op_inputs.insert(op.id(), (op.clone(), inputs.into_iter().collect()));
		self
	}

	/// A new client. It has no terminal op until a commit binds one.
	pub fn create_client(&mut self) -> Client {
		Client::new(self.runtime.clone())
	}

	pub fn set_client_op(&mut self, client: &Client, op: &Op) -> &mut Self {
		self.client_ops.insert(client.id(), (client.clone(), op.clone()));
		self
	}

	pub fn is_empty(&self) -> bool {
		self.new_ops.is_empty() && self.op_args.is_empty() && self.op_inputs.is_empty() && self.client_ops.is_empty()
	}

	/// Ops created by this transaction and not yet committed.
	pub fn pending_ops(&self) -> impl Iterator<Item = &Op> {
		self.new_ops.values()
	}

	/// Drops everything staged.
	pub fn clear(&mut self) {
		self.new_ops.clear();
		self.op_args.clear();
		self.op_inputs.clear();
		self.client_ops.clear();
	}

	pub fn runtime(&self) -> Option<Runtime> {
		self.runtime.upgrade().map(Runtime::from_inner)
	}
}
