//! Helpers for loading serialized op trees into a runtime.

use kodachi_attribute::GroupAttribute;
use tracing::debug;

use crate::client::Client;
use crate::error::RuntimeError;
use crate::runtime::Runtime;

/// Stages `optree`, binds a new client to its last op and commits.
///
/// Returns `None` for an empty tree.
pub fn load_op_tree(runtime: &Runtime, optree: &GroupAttribute) -> Result<Option<Client>, RuntimeError> {
	let mut txn = runtime.create_transaction();
	let ops = txn.parse_graph(optree)?;
	let Some(terminal) = ops.last() else {
		return Ok(None);
	};

	let client = txn.create_client();
	txn.set_client_op(&client, terminal);
	let commit = runtime.commit(&mut txn)?;
	debug!(ops = ops.len(), terminal = %terminal.id(), commit = commit.get(), "loaded op tree");
	Ok(Some(client))
}
