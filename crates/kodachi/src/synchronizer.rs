use kodachi_geolib::{GeolibTransaction, NativeOpId};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::SyncError;
use crate::op::Op;

/// Replicates committed op subgraphs from the master engine into one thread engine.
///
/// The op map is never invalidated: a master native id always denotes the same
/// `(type, args, inputs)`, so an op replicated once stays valid for the lifetime of the
/// destination engine.
#[derive(Debug, Default)]
pub struct OpTreeSynchronizer {
	/// master native id -> destination native id
	op_map: FxHashMap<NativeOpId, NativeOpId>,
	replicated: u64,
}

impl OpTreeSynchronizer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the destination equivalent of `src`, staging any missing ops on `txn`.
	///
	/// Ops are visited inputs-first with an explicit stack; already mapped subgraphs are
	/// not entered. Mappings are recorded immediately, so `txn` must be committed to the
	/// destination engine (or the synchronizer discarded).
	pub fn sync_from_op(&mut self, txn: &mut GeolibTransaction, src: &Op) -> Result<NativeOpId, SyncError> {
		if let Some(dest) = self.lookup(src)? {
			return Ok(dest);
		}

		let mut stack: Vec<(&Op, bool)> = vec![(src, false)];
		while let Some((op, expanded)) = stack.pop() {
			let committed = op.committed().ok_or(SyncError::Uncommitted(op.id()))?;
			if self.op_map.contains_key(&committed.native) {
				continue;
			}
			if !expanded {
				stack.push((op, true));
				for input in committed.inputs.iter().rev() {
					if self.lookup(input)?.is_none() {
						stack.push((input, false));
					}
				}
				continue;
			}

			let mut inputs = Vec::with_capacity(committed.inputs.len());
			for input in &committed.inputs {
				inputs.push(self.lookup(input)?.ok_or(SyncError::Uncommitted(input.id()))?);
			}
			let dest = txn.create_op();
			txn.set_op_args(dest, committed.op_type.clone(), committed.args.clone());
			if !inputs.is_empty() {
				txn.set_op_inputs(dest, inputs);
			}
			self.op_map.insert(committed.native, dest);
			self.replicated += 1;
			trace!(op_id = %op.id(), src = %committed.native, dest = %dest, "replicated op");
		}

		self.lookup(src)?.ok_or(SyncError::Uncommitted(src.id()))
	}

	fn lookup(&self, op: &Op) -> Result<Option<NativeOpId>, SyncError> {
		let native = op.native_id().ok_or(SyncError::Uncommitted(op.id()))?;
		Ok(self.op_map.get(&native).copied())
	}

	/// Destination id of a master native op, if replicated.
	pub fn destination(&self, master: NativeOpId) -> Option<NativeOpId> {
		self.op_map.get(&master).copied()
	}

	pub fn op_map_len(&self) -> usize {
		self.op_map.len()
	}

	/// Ops created in the destination engine so far.
	pub fn replicated(&self) -> u64 {
		self.replicated
	}
}
