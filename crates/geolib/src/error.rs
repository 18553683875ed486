use thiserror::Error;

use crate::ids::{NativeClientId, NativeOpId};

/// Engine-level failures. Missing scene data is never reported here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolibError {
	/// An op id that this engine never issued.
	#[error("unknown op {0}")]
	UnknownOp(NativeOpId),

	/// A client id that this engine never issued, or one that was removed.
	#[error("unknown client {0}")]
	UnknownClient(NativeClientId),

	/// The transaction was created by a different engine instance.
	#[error("transaction belongs to engine {found}, not engine {expected}")]
	ForeignTransaction { expected: u64, found: u64 },

	/// Applying the transaction would make `op` reachable from itself.
	#[error("input cycle through {0}")]
	Cycle(NativeOpId),

	/// Cooking was requested before the client was bound to an op.
	#[error("client {0} has no op")]
	NoClientOp(NativeClientId),
}
