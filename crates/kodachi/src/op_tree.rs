//! Serialized op trees.
//!
//! An op tree is a [`GroupAttribute`] with one child per op, named by the op's
//! [`KodachiOpId`]:
//!
//! ```text
//! <op id> = {
//!     opType   = "AddOp"
//!     opArgs   = { amount = 2 }
//!     opInputs = ["<op id>", ...]   // optional
//! }
//! ```
//!
//! [`Transaction::parse_graph`] stages such a tree on a runtime transaction;
//! [`OpTreeBuilder`] assembles one without a runtime.

use kodachi_attribute::{Attribute, BuildMode, GroupAttribute, GroupBuilder, StringAttribute};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{error, warn};

use crate::error::{BuilderError, GraphError, ParseOpIdError};
use crate::op::Op;
use crate::op_id::KodachiOpId;
use crate::transaction::Transaction;

pub const OP_TYPE: &str = "opType";
pub const OP_ARGS: &str = "opArgs";
pub const OP_INPUTS: &str = "opInputs";

/// Parses a non-null op id.
pub fn parse_op_id(s: &str) -> Result<KodachiOpId, ParseOpIdError> {
	let id: KodachiOpId = s.parse()?;
	if id.is_null() {
		return Err(ParseOpIdError::new(s));
	}
	Ok(id)
}

struct OpEntry {
	id: KodachiOpId,
	op_type: Option<String>,
	args: Attribute,
	inputs: Option<Vec<KodachiOpId>>,
}

impl OpEntry {
	fn parse(name: &str, attr: &Attribute) -> Result<Self, ParseOpIdError> {
		let id = parse_op_id(name)?;
		let op_type = attr.child(OP_TYPE).str_value().map(str::to_owned);
		let inputs = match attr.child(OP_INPUTS) {
			Attribute::String(inputs) => Some(inputs.iter_str().map(parse_op_id).collect::<Result<Vec<_>, _>>()?),
			_ => None,
		};
		Ok(Self {
			id,
			op_type,
			args: attr.child(OP_ARGS),
			inputs,
		})
	}

	/// Whether staging this entry on `op` would change nothing.
	fn matches(&self, op: &Op) -> bool {
		let Some((op_type, args)) = op.op_args() else {
			return false;
		};
		let type_matches = self.op_type.as_ref().is_none_or(|t| t == op_type && self.args == *args);
		let inputs_matches = self.inputs.as_ref().is_none_or(|ids| ids.iter().copied().eq(op.inputs().iter().map(Op::id)));
		type_matches && inputs_matches
	}
}

fn parse_entries(graph: &GroupAttribute) -> Result<Vec<OpEntry>, ParseOpIdError> {
	graph.iter().map(|(name, attr)| OpEntry::parse(name, attr)).collect()
}

impl Transaction {
	/// Stages every op described by `graph` and returns them in the order described.
	///
	/// Ops already committed with exactly the described state are returned without
	/// being staged again, so importing the same tree twice is harmless. Any invalid id
	/// rejects the whole graph before anything is staged.
	pub fn parse_graph(&mut self, graph: &GroupAttribute) -> Result<Vec<Op>, GraphError> {
		let entries = parse_entries(graph)?;
		let mut ops = Vec::with_capacity(entries.len());
		for entry in entries {
			let Some(op) = self.get_or_create_op(entry.id) else {
				continue;
			};
			if !entry.matches(&op) {
				if let Some(op_type) = &entry.op_type {
					self.set_op_args(&op, op_type.as_str(), entry.args.clone());
				}
				if let Some(ids) = &entry.inputs {
					let inputs: Vec<Op> = ids.iter().filter_map(|id| self.get_or_create_op(*id)).collect();
					self.set_op_inputs(&op, inputs);
				}
			}
			ops.push(op);
		}
		Ok(ops)
	}

	/// Creates one op per child of `chain` (`opType`, `opArgs`), each taking the
	/// previous op as its only input. Returns the last op, or `op` for an empty chain.
	pub fn append_op_chain(&mut self, op: &Op, chain: &GroupAttribute) -> Op {
		let mut tail = op.clone();
		for (name, entry) in chain.iter() {
			if entry.as_group().is_none() {
				warn!(entry = name, "skipping op chain entry that is not a group");
				continue;
			}
			let next = self.create_op();
			let op_type = entry.child(OP_TYPE);
			self.set_op_args(&next, op_type.str_value().unwrap_or_default(), entry.child(OP_ARGS));
			self.set_op_inputs(&next, [tail]);
			tail = next;
		}
		tail
	}

	/// Chains `ops` upstream of `op`: `op` takes the first element as its only input,
	/// each element the one after it. Returns the last element, the new head of the
	/// chain, or `op` when `ops` is empty.
	///
	/// Every op but the last gets new inputs, so `op` must not be committed yet.
	pub fn append_ops(&mut self, op: &Op, ops: &[Op]) -> Op {
		let mut head = op.clone();
		for next in ops {
			self.set_op_inputs(&head, [next.clone()]);
			head = next.clone();
		}
		head
	}
}

/// Ids of the ops in `optree` that no other op uses as an input, in tree order.
/// Entries whose name is not a valid id are ignored.
pub fn find_terminal_ops(optree: &GroupAttribute) -> Vec<KodachiOpId> {
	let mut used: FxHashSet<String> = FxHashSet::default();
	for (_, attr) in optree.iter() {
		if let Attribute::String(inputs) = attr.child(OP_INPUTS) {
			used.extend(inputs.iter_str().map(str::to_owned));
		}
	}
	optree
		.iter()
		.filter(|(name, _)| !used.contains(*name))
		.filter_map(|(name, _)| match parse_op_id(name) {
			Ok(id) => Some(id),
			Err(e) => {
				warn!(error = %e, "ignoring op tree entry");
				None
			}
		})
		.collect()
}

/// Handle to an op of an [`OpTreeBuilder`]. Equal handles name the same op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuilderOp(KodachiOpId);

impl BuilderOp {
	pub fn id(&self) -> KodachiOpId {
		self.0
	}
}

#[derive(Default)]
struct BuilderState {
	ops: FxHashMap<KodachiOpId, BuilderOp>,
	delta: GroupBuilder,
	merged: GroupBuilder,
}

impl BuilderState {
	fn create_op(&mut self, id: KodachiOpId) -> BuilderOp {
		let op = BuilderOp(id);
		self.ops.insert(id, op);
		self.set_op_args(op, "no-op", GroupAttribute::default().into());
		op
	}

	fn set_op_args(&mut self, op: BuilderOp, op_type: &str, args: Attribute) {
		let key = op.0.to_string();
		self.delta.set(&format!("{key}.{OP_TYPE}"), op_type);
		self.delta.set(&format!("{key}.{OP_ARGS}"), args);
	}

	fn set_op_inputs(&mut self, op: BuilderOp, inputs: &[BuilderOp]) {
		let mut ids = Vec::with_capacity(inputs.len());
		for input in inputs {
			if self.ops.contains_key(&input.0) {
				ids.push(input.0.to_string());
			} else {
				error!(op_id = %input.0, "skipping op input that was not created by this builder");
			}
		}
		self.delta.set(&format!("{}.{OP_INPUTS}", op.0), StringAttribute::new(ids));
	}

	fn check(&self, op: BuilderOp) -> Result<(), BuilderError> {
		match self.ops.contains_key(&op.0) {
			true => Ok(()),
			false => Err(BuilderError::ForeignOp(op.0)),
		}
	}
}

/// Thread-safe assembler of serialized op trees.
///
/// Edits accumulate in a delta. [`OpTreeBuilder::build_delta`] returns just the
/// edits since the last build; [`OpTreeBuilder::build`] folds them into the full tree
/// and extracts the part reachable from a terminal op.
#[derive(Default)]
pub struct OpTreeBuilder {
	state: Mutex<BuilderState>,
}

impl std::fmt::Debug for OpTreeBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OpTreeBuilder").field("ops", &self.state.lock().ops.len()).finish()
	}
}

impl OpTreeBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// New op, initially a `no-op` with empty args.
	pub fn create_op(&self) -> BuilderOp {
		self.state.lock().create_op(KodachiOpId::generate())
	}

	pub fn contains(&self, op: BuilderOp) -> bool {
		self.state.lock().ops.contains_key(&op.0)
	}

	pub fn get_op_from_op_id(&self, id: KodachiOpId) -> Option<BuilderOp> {
		self.state.lock().ops.get(&id).copied()
	}

	pub fn set_op_args(&self, op: BuilderOp, op_type: &str, args: impl Into<Attribute>) -> Result<&Self, BuilderError> {
		let mut state = self.state.lock();
		state.check(op)?;
		state.set_op_args(op, op_type, args.into());
		Ok(self)
	}

	/// Sets `op`'s inputs. Inputs not created by this builder are skipped.
	pub fn set_op_inputs(&self, op: BuilderOp, inputs: &[BuilderOp]) -> Result<&Self, BuilderError> {
		let mut state = self.state.lock();
		state.check(op)?;
		state.set_op_inputs(op, inputs);
		Ok(self)
	}

	/// Merges `optree` into this builder, registering ops it does not know yet.
	///
	/// Returns every op of `optree` with a terminal op moved to the end.
	pub fn merge(&self, optree: &GroupAttribute) -> Result<Vec<BuilderOp>, BuilderError> {
		if optree.is_empty() {
			return Ok(Vec::new());
		}
		let entries = parse_entries(optree).map_err(GraphError::from)?;

		let mut state = self.state.lock();
		let mut used: FxHashSet<KodachiOpId> = FxHashSet::default();
		let mut ops = Vec::with_capacity(entries.len());
		for entry in &entries {
			let op = match state.ops.get(&entry.id) {
				Some(op) => *op,
				None => state.create_op(entry.id),
			};
			ops.push(op);
			used.extend(entry.inputs.iter().flatten().copied());
		}

		let terminal = ops.iter().position(|op| !used.contains(&op.0)).ok_or(GraphError::NoTerminalOp)?;
		let terminal = ops.remove(terminal);
		ops.push(terminal);

		state.delta.update(optree);
		Ok(ops)
	}

	/// Makes `op1` the only input of `op2`. Returns `op2`.
	pub fn append_op(&self, op1: BuilderOp, op2: BuilderOp) -> Result<BuilderOp, BuilderError> {
		self.set_op_inputs(op2, &[op1])?;
		Ok(op2)
	}

	/// Creates one op per child of `chain` and chains them after `op`.
	/// Returns `op` followed by the created ops.
	pub fn append_op_chain(&self, op: BuilderOp, chain: &GroupAttribute) -> Result<Vec<BuilderOp>, BuilderError> {
		let mut state = self.state.lock();
		state.check(op)?;

		let mut ops = Vec::with_capacity(chain.len() + 1);
		ops.push(op);
		let mut tail = op;
		for (_, entry) in chain.iter() {
			let next = state.create_op(KodachiOpId::generate());
			let op_type = entry.child(OP_TYPE);
			state.set_op_args(next, op_type.str_value().unwrap_or_default(), entry.child(OP_ARGS));
			state.set_op_inputs(next, &[tail]);
			tail = next;
			ops.push(next);
		}
		Ok(ops)
	}

	/// Edits since the last build. `Retain` also folds them into the full tree;
	/// `Flush` discards the full tree.
	pub fn build_delta(&self, mode: BuildMode) -> GroupAttribute {
		let mut state = self.state.lock();
		let delta = state.delta.build(BuildMode::Flush);
		match mode {
			BuildMode::Flush => state.merged = GroupBuilder::new(),
			BuildMode::Retain => {
				state.merged.deep_update(&delta);
			}
		}
		delta
	}

	/// The subtree reachable from `terminal`, inputs before the ops that use them.
	pub fn build(&self, terminal: BuilderOp, mode: BuildMode) -> Result<GroupAttribute, BuilderError> {
		let mut state = self.state.lock();
		state.check(terminal)?;

		let delta = state.delta.build(BuildMode::Flush);
		state.merged.deep_update(&delta);
		let graph = state.merged.build(mode);
		drop(state);

		let mut order = Vec::new();
		let mut entered: FxHashSet<KodachiOpId> = FxHashSet::default();
		let mut emitted: FxHashSet<KodachiOpId> = FxHashSet::default();
		let mut stack = vec![(terminal.0, false)];
		while let Some((id, expanded)) = stack.pop() {
			if expanded {
				if emitted.insert(id) {
					let name = id.to_string();
					let attr = graph.get(&name).cloned().ok_or(BuilderError::MissingOp(id))?;
					order.push((name, attr));
				}
				continue;
			}
			if !entered.insert(id) {
				continue;
			}
			let attr = graph.get(&id.to_string()).ok_or(BuilderError::MissingOp(id))?;
			stack.push((id, true));
			if let Attribute::String(inputs) = attr.child(OP_INPUTS) {
				let inputs: Vec<&str> = inputs.iter_str().collect();
				for input in inputs.into_iter().rev() {
					let input = parse_op_id(input).map_err(GraphError::from)?;
					if !entered.contains(&input) {
						stack.push((input, false));
					}
				}
			}
		}

		Ok(GroupAttribute::new(order))
	}
}
