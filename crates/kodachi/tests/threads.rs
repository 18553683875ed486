use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, Ordering};

use kodachi_attribute::{Attribute, GroupAttribute};
use kodachi_runtime::{DEFAULT_HOST, HostError, Op, Runtime, ThreadKey, Transaction, set_host};

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

#[test]
fn every_thread_cooks_on_its_own_engine() {
	const THREADS: usize = 8;
	let rt = runtime();
	let mut txn = rt.create_transaction();
	let base = constant(&mut txn, 1);
	let add = txn.create_op();
	txn.set_op_args(&add, "AddOp", GroupAttribute::new([("amount", Attribute::from(2))]));
	txn.set_op_inputs(&add, [base]);
	let client = txn.create_client();
	txn.set_client_op(&client, &add);
	rt.commit(&mut txn).unwrap();

	let start = Barrier::new(THREADS);
	let keys: Vec<ThreadKey> = std::thread::scope(|s| {
		let handles: Vec<_> = (0..THREADS)
			.map(|_| {
				s.spawn(|| {
					start.wait();
					for _ in 0..10 {
						let root = client.cook_location("/root", false).unwrap();
						assert_eq!(root.attr("value").int_value(), Some(3));
					}
					ThreadKey::current()
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	assert_eq!(rt.thread_keys().len(), THREADS);
	for key in keys {
		let stats = rt.thread_stats(key).unwrap();
		assert_eq!(stats.replicated_ops, 2);
		assert_eq!(stats.syncs, 1);
		assert_eq!(stats.clients, 1);
	}
}

#[test]
fn readers_never_go_back_in_time() {
	const REVISIONS: i32 = 50;
	let rt = runtime();
	let mut txn = rt.create_transaction();
	let first = constant(&mut txn, 0);
	let client = txn.create_client();
	txn.set_client_op(&client, &first);
	rt.commit(&mut txn).unwrap();

	let done = AtomicBool::new(false);
	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				let mut last = 0;
				while !done.load(Ordering::Acquire) {
					let value = client.cook_location("/root", true).unwrap().attr("value").int_value().unwrap();
					assert!(value >= last, "cooked {value} after {last}");
					last = value;
				}
				let value = client.cook_location("/root", true).unwrap().attr("value").int_value();
				assert_eq!(value, Some(REVISIONS));
			});
		}
		s.spawn(|| {
			for revision in 1..=REVISIONS {
				let mut txn = rt.create_transaction();
				let op = constant(&mut txn, revision);
				txn.set_client_op(&client, &op);
				rt.commit(&mut txn).unwrap();
			}
			done.store(true, Ordering::Release);
		});
	});
}

#[test]
fn long_lived_thread_sees_rebind() {
	let rt = runtime();
	let mut txn = rt.create_transaction();
	let x = constant(&mut txn, 1);
	let client = txn.create_client();
	txn.set_client_op(&client, &x);
	rt.commit(&mut txn).unwrap();

	let cooked = Barrier::new(2);
	let rebound = Barrier::new(2);
	std::thread::scope(|s| {
		s.spawn(|| {
			let root = client.cook_location("/root", false).unwrap();
			assert_eq!(root.attr("value").int_value(), Some(1));
			cooked.wait();
			rebound.wait();
			let root = client.cook_location("/root", false).unwrap();
			assert_eq!(root.attr("value").int_value(), Some(2));
		});

		cooked.wait();
		let mut txn = rt.create_transaction();
		let y = constant(&mut txn, 2);
		txn.set_client_op(&client, &y);
		rt.commit(&mut txn).unwrap();
		rebound.wait();
	});
}

#[test]
fn concurrent_commits_and_lookups_agree() {
	let rt = &runtime();
	let ops: Vec<Op> = std::thread::scope(|s| {
		let handles: Vec<_> = (0..4)
			.map(|i| {
				s.spawn(move || {
					let mut txn = rt.create_transaction();
					let ops: Vec<Op> = (0..25).map(|j| constant(&mut txn, i * 100 + j)).collect();
					rt.commit(&mut txn).unwrap();
					ops
				})
			})
			.collect();
		handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
	});

	assert_eq!(rt.op_count(), 100);
	assert_eq!(rt.latest_commit_id().get(), 4);
	for op in &ops {
		assert_eq!(rt.get_op_from_op_id(op.id()).as_ref(), Some(op));
	}
}
