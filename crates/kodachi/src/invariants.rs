//! Machine-checkable invariant proofs for the runtime.
//!
//! Each invariant is an `inv_*` body with a `pub(crate) fn test_*()` wrapper that is both
//! a runnable test and an intra-doc link target for the crate docs.

#![allow(dead_code)]

use kodachi_attribute::{Attribute, GroupAttribute};

use crate::{CommitError, DEFAULT_HOST, HostError, Op, Runtime, ThreadKey, Transaction, set_host};

fn runtime() -> Runtime {
	match set_host(&DEFAULT_HOST) {
		Ok(()) | Err(HostError::AlreadySet { .. }) => {}
		Err(e) => panic!("{e}"),
	}
	Runtime::create().unwrap()
}

fn constant(txn: &mut Transaction, value: i32) -> Op {
	let op = txn.create_op();
	txn.set_op_args(&op, "ConstantOp", GroupAttribute::new([("value", Attribute::from(value))]));
	op
}

fn add(txn: &mut Transaction, input: &Op) -> Op {
	let op = txn.create_op();
	txn.set_op_args(&op, "AddOp", GroupAttribute::default());
	txn.set_op_inputs(&op, [input.clone()]);
	op
}

/// Invariant: Every op id MUST resolve to the one handle created for it, from any thread.
pub(crate) fn inv_op_identity_is_shared() {
	let rt = runtime();
	let mut txn = rt.create_transaction();
	let op = constant(&mut txn, 1);
	rt.commit(&mut txn).unwrap();

	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				let found = rt.get_op_from_op_id(op.id()).unwrap();
				assert_eq!(found, op, "lookup returned a second handle for one id");

				let mut txn = rt.create_transaction();
				let staged = txn.get_or_create_op(op.id()).unwrap();
				assert_eq!(staged, op, "transaction created a second handle for a committed id");
			});
		}
	});
}

#[cfg_attr(test, test)]
pub(crate) fn test_op_identity_is_shared() {
	inv_op_identity_is_shared()
}

/// Invariant: Commit ids MUST strictly increase, with no id handed out twice.
pub(crate) fn inv_commit_ids_strictly_increase() {
	const THREADS: usize = 8;
	const COMMITS: usize = 16;

	let rt = runtime();
	let mut ids: Vec<u64> = std::thread::scope(|s| {
		let handles: Vec<_> = (0..THREADS)
			.map(|_| {
				s.spawn(|| {
					let mut seen = Vec::with_capacity(COMMITS);
					for i in 0..COMMITS {
						let mut txn = rt.create_transaction();
						constant(&mut txn, i as i32);
						seen.push(rt.commit(&mut txn).unwrap().get());
					}
					assert!(seen.windows(2).all(|w| w[0] < w[1]), "ids went backwards on one thread");
					seen
				})
			})
			.collect();
		handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
	});

	ids.sort_unstable();
	ids.dedup();
	assert_eq!(ids.len(), THREADS * COMMITS, "a commit id was handed out twice");
	assert_eq!(rt.latest_commit_id().get(), (THREADS * COMMITS) as u64);
}

#[cfg_attr(test, test)]
pub(crate) fn test_commit_ids_strictly_increase() {
	inv_commit_ids_strictly_increase()
}

/// Invariant: Cooking again without an intervening commit MUST NOT sync or replicate.
///
/// A commit that leaves the client's op alone syncs but replicates nothing.
pub(crate) fn inv_replication_is_idempotent() {
	let rt = runtime();
	let key = ThreadKey::virtual_thread(1);
	let mut txn = rt.create_transaction();
	let a = constant(&mut txn, 1);
	let b = add(&mut txn, &a);
	let client = txn.create_client();
	txn.set_client_op(&client, &b);
	rt.commit(&mut txn).unwrap();

	client.on(key).cook_location("/root", false).unwrap();
	let first = rt.thread_stats(key).unwrap();
	assert_eq!(first.replicated_ops, 2);
	assert_eq!(first.syncs, 1);

	client.on(key).cook_location("/root", false).unwrap();
	assert_eq!(rt.thread_stats(key).unwrap(), first);

	let mut txn = rt.create_transaction();
	constant(&mut txn, 7);
	rt.commit(&mut txn).unwrap();
	client.on(key).cook_location("/root", false).unwrap();
	let after = rt.thread_stats(key).unwrap();
	assert_eq!(after.syncs, 2);
	assert_eq!(after.replicated_ops, first.replicated_ops);
}

#[cfg_attr(test, test)]
pub(crate) fn test_replication_is_idempotent() {
	inv_replication_is_idempotent()
}

/// Invariant: An op reachable from several clients MUST be replicated once per engine.
pub(crate) fn inv_shared_inputs_replicate_once() {
	let rt = runtime();
	let key = ThreadKey::virtual_thread(2);
	let mut txn = rt.create_transaction();
	let a = constant(&mut txn, 1);
	let b = add(&mut txn, &a);
	let c = add(&mut txn, &a);
	let first = txn.create_client();
	let second = txn.create_client();
	txn.set_client_op(&first, &b).set_client_op(&second, &c);
	rt.commit(&mut txn).unwrap();

	first.on(key).cook_location("/root", false).unwrap();
	second.on(key).cook_location("/root", false).unwrap();

	let stats = rt.thread_stats(key).unwrap();
	assert_eq!(stats.op_map_len, 3);
	assert_eq!(stats.replicated_ops, 3);
	assert!(rt.is_replicated(key, &a));
}

#[cfg_attr(test, test)]
pub(crate) fn test_shared_inputs_replicate_once() {
	inv_shared_inputs_replicate_once()
}

/// Invariant: Args and inputs of a committed op MUST NOT change.
pub(crate) fn inv_committed_ops_are_frozen() {
	let rt = runtime();
	let mut txn = rt.create_transaction();
	let a = constant(&mut txn, 1);
	let b = constant(&mut txn, 2);
	rt.commit(&mut txn).unwrap();

	let mut txn = rt.create_transaction();
	txn.set_op_args(&a, "ConstantOp", GroupAttribute::new([("value", Attribute::from(5))]));
	assert_eq!(rt.commit(&mut txn), Err(CommitError::OpFrozen(a.id())));

	let mut txn = rt.create_transaction();
	txn.set_op_inputs(&a, [b.clone()]);
	assert_eq!(rt.commit(&mut txn), Err(CommitError::OpFrozen(a.id())));

	let (op_type, args) = a.op_args().unwrap();
	assert_eq!(op_type, "ConstantOp");
	assert_eq!(args.child("value").int_value(), Some(1));
	assert!(a.inputs().is_empty());
}

#[cfg_attr(test, test)]
pub(crate) fn test_committed_ops_are_frozen() {
	inv_committed_ops_are_frozen()
}

/// Invariant: A rejected commit MUST leave the runtime and the transaction unchanged.
pub(crate) fn inv_rejected_commit_changes_nothing() {
	let rt = runtime();
	let mut txn = rt.create_transaction();
	constant(&mut txn, 1);
	let before = rt.commit(&mut txn).unwrap();
	let ops_before = rt.op_count();

	let mut txn = rt.create_transaction();
	let x = constant(&mut txn, 2);
	let y = add(&mut txn, &x);
	txn.set_op_inputs(&x, [y.clone()]);
	let err = rt.commit(&mut txn).unwrap_err();
	assert!(matches!(err, CommitError::Cycle(_)), "{err:?}");

	assert_eq!(rt.latest_commit_id(), before);
	assert_eq!(rt.op_count(), ops_before);
	assert!(!x.is_committed() && !y.is_committed());
	assert!(!rt.is_valid_op(x.id()));
	assert_eq!(txn.pending_ops().count(), 2);

	txn.set_op_inputs(&x, Vec::new());
	let after = rt.commit(&mut txn).unwrap();
	assert_eq!(after, before.next());
	assert!(txn.is_empty());
	assert_eq!(y.inputs(), [x]);
}

#[cfg_attr(test, test)]
pub(crate) fn test_rejected_commit_changes_nothing() {
	inv_rejected_commit_changes_nothing()
}
