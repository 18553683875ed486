use std::sync::Arc;

use kodachi_attribute::{Attribute, GroupAttribute, StringAttribute};
use pretty_assertions::assert_eq;

use super::*;

fn engine() -> GeolibRuntime {
	GeolibRuntime::new(Arc::new(OpTypeRegistry::with_builtins()))
}

fn strings(values: &[&str]) -> Attribute {
	StringAttribute::from(values).into()
}

fn group(children: &[(&str, Attribute)]) -> Attribute {
	GroupAttribute::new(children.iter().cloned()).into()
}

/// `/root/a` created, then `value` set on it.
fn create_scene(rt: &mut GeolibRuntime) -> (NativeClientId, NativeOpId, NativeOpId) {
	let mut txn = rt.create_transaction();
	let create = txn.create_op();
	let set = txn.create_op();
	txn.set_op_args(create, "LocationCreate", group(&[("paths", strings(&["/root/a"]))]));
	txn.set_op_args(
		set,
		"AttributeSet",
		group(&[("location", "/root/a".into()), ("attrs", group(&[("value", 1.into())]))]),
	);
	txn.set_op_inputs(set, vec![create]);
	let client = txn.create_client();
	txn.set_client_op(client, set);
	rt.commit(txn).unwrap();
	(client, create, set)
}

#[test]
fn commit_ids_increase() {
	let mut rt = engine();
	assert_eq!(rt.latest_commit_id(), CommitId::ZERO);
	let first = rt.commit(rt.create_transaction()).unwrap();
	let second = rt.commit(rt.create_transaction()).unwrap();
	assert!(second > first);
	assert_eq!(rt.latest_commit_id(), second);
}

#[test]
fn cook_created_location() {
	let mut rt = engine();
	let (client, _, _) = create_scene(&mut rt);

	let root = rt.cook_location(client, "/root").unwrap();
	assert!(root.exists());
	assert_eq!(root.potential_children().values(), ["a".to_owned()]);

	let a = rt.cook_location(client, "/root/a").unwrap();
	assert!(a.exists());
	assert_eq!(a.attrs().child("value").int_value(), Some(1));

	assert!(!rt.cook_location(client, "/root/b").unwrap().exists());
}

#[test]
fn cooks_are_memoized_per_path() {
	let mut rt = engine();
	let (client, _, _) = create_scene(&mut rt);

	rt.cook_location(client, "/root/a").unwrap();
	let after_first = rt.stats();
	assert_eq!(after_first.cooks, 2);

	rt.cook_location(client, "/root/a").unwrap();
	assert_eq!(rt.stats().cooks, after_first.cooks);
	assert_eq!(rt.stats().cache_hits, 1);
	assert_eq!(rt.cached_locations(), vec!["/root/a".to_owned()]);
}

#[test]
fn evict_keeps_only_named_path() {
	let mut rt = engine();
	let (client, _, _) = create_scene(&mut rt);
	rt.cook_location(client, "/root").unwrap();
	rt.cook_location(client, "/root/a").unwrap();

	rt.evict("/root/a");
	assert_eq!(rt.cached_locations(), vec!["/root/a".to_owned()]);

	rt.flush_caches();
	assert!(rt.cached_locations().is_empty());
}

#[test]
fn editing_an_existing_op_invalidates_the_cache() {
	let mut rt = engine();
	let (client, _, set) = create_scene(&mut rt);
	rt.cook_location(client, "/root/a").unwrap();

	let mut txn = rt.create_transaction();
	txn.set_op_args(
		set,
		"AttributeSet",
		group(&[("location", "/root/a".into()), ("attrs", group(&[("value", 7.into())]))]),
	);
	rt.commit(txn).unwrap();

	let a = rt.cook_location(client, "/root/a").unwrap();
	assert_eq!(a.attrs().child("value").int_value(), Some(7));
}

#[test]
fn add_op_chain_accumulates() {
	let mut rt = engine();
	let (client, _, set) = create_scene(&mut rt);

	let mut txn = rt.create_transaction();
	let mut tail = set;
	for _ in 0..3 {
		let add = txn.create_op();
		txn.set_op_args(add, "AddOp", group(&[("amount", 2.into())]));
		txn.set_op_inputs(add, vec![tail]);
		tail = add;
	}
	txn.set_client_op(client, tail);
	rt.commit(txn).unwrap();

	let a = rt.cook_location(client, "/root/a").unwrap();
	assert_eq!(a.attrs().child("value").int_value(), Some(7));
}

#[test]
fn prune_removes_subtree_and_child_entry() {
	let mut rt = engine();
	let (client, _, set) = create_scene(&mut rt);

	let mut txn = rt.create_transaction();
	let prune = txn.create_op();
	txn.set_op_args(prune, "Prune", group(&[("paths", strings(&["/root/a"]))]));
	txn.set_op_inputs(prune, vec![set]);
	txn.set_client_op(client, prune);
	rt.commit(txn).unwrap();

	assert!(!rt.cook_location(client, "/root/a").unwrap().exists());
	assert!(rt.cook_location(client, "/root").unwrap().potential_children().is_empty());
}

#[test]
fn merge_prefers_earlier_inputs() {
	let mut rt = engine();
	let mut txn = rt.create_transaction();
	let left = txn.create_op();
	let right = txn.create_op();
	let merge = txn.create_op();
	txn.set_op_args(
		left,
		"LocationCreate",
		group(&[("paths", strings(&["/root/x"])), ("attrs", group(&[("v", 1.into())]))]),
	);
	txn.set_op_args(
		right,
		"LocationCreate",
		group(&[("paths", strings(&["/root/x", "/root/y"])), ("attrs", group(&[("v", 2.into())]))]),
	);
	txn.set_op_args(merge, "Merge", Attribute::Null);
	txn.set_op_inputs(merge, vec![left, right]);
	let client = txn.create_client();
	txn.set_client_op(client, merge);
	rt.commit(txn).unwrap();

	let root = rt.cook_location(client, "/root").unwrap();
	assert_eq!(root.potential_children().values(), ["x".to_owned(), "y".to_owned()]);
	let x = rt.cook_location(client, "/root/x").unwrap();
	assert_eq!(x.attrs().child("v").int_value(), Some(1));
	let y = rt.cook_location(client, "/root/y").unwrap();
	assert_eq!(y.attrs().child("v").int_value(), Some(2));
}

#[test]
fn untyped_op_cooks_to_error_location() {
	let mut rt = engine();
	let mut txn = rt.create_transaction();
	let op = txn.create_op();
	let client = txn.create_client();
	txn.set_client_op(client, op);
	rt.commit(txn).unwrap();

	let root = rt.cook_location(client, "/root").unwrap();
	assert!(root.exists());
	assert_eq!(root.attrs().child("type").str_value(), Some(ops::ERROR_TYPE));
	assert!(root.attrs().child("errorMessage").str_value().is_some());
}

#[test]
fn unknown_type_reports_its_name() {
	let mut rt = engine();
	let mut txn = rt.create_transaction();
	let op = txn.create_op();
	txn.set_op_args(op, "NoSuchOp", Attribute::Null);
	let client = txn.create_client();
	txn.set_client_op(client, op);
	rt.commit(txn).unwrap();

	let root = rt.cook_location(client, "/root").unwrap();
	let message = root.attrs().child("errorMessage");
	assert!(message.str_value().is_some_and(|m| m.contains("NoSuchOp")));
}

#[test]
fn cycle_is_rejected_without_applying() {
	let mut rt = engine();
	let (_, create, set) = create_scene(&mut rt);
	let before = rt.latest_commit_id();

	let mut txn = rt.create_transaction();
	txn.set_op_inputs(create, vec![set]);
	assert!(matches!(rt.commit(txn), Err(GeolibError::Cycle(_))));
	assert_eq!(rt.latest_commit_id(), before);
	assert_eq!(rt.op_inputs(create), Some(&[][..]));
}

#[test]
fn self_input_is_a_cycle() {
	let mut rt = engine();
	let mut txn = rt.create_transaction();
	let op = txn.create_op();
	txn.set_op_inputs(op, vec![op]);
	assert_eq!(rt.commit(txn), Err(GeolibError::Cycle(op)));
	assert_eq!(rt.op_count(), 0);
}

#[test]
fn foreign_transaction_is_rejected() {
	let mut a = engine();
	let b = engine();
	let txn = b.create_transaction();
	assert!(matches!(a.commit(txn), Err(GeolibError::ForeignTransaction { .. })));
}

#[test]
fn unknown_ids_are_rejected() {
	let mut rt = engine();
	let mut txn = rt.create_transaction();
	let ghost = NativeOpId(9_999);
	txn.set_op_args(ghost, "no-op", Attribute::Null);
	assert_eq!(rt.commit(txn), Err(GeolibError::UnknownOp(ghost)));

	let client = NativeClientId(42);
	assert_eq!(rt.cook_location(client, "/root"), Err(GeolibError::UnknownClient(client)));
}

#[test]
fn client_without_op_cannot_cook() {
	let mut rt = engine();
	let mut txn = rt.create_transaction();
	let client = txn.create_client();
	rt.commit(txn).unwrap();
	assert_eq!(rt.cook_location(client, "/root"), Err(GeolibError::NoClientOp(client)));
}

#[test]
fn location_events_fire_once_per_change() {
	let mut rt = engine();
	let (client, _, set) = create_scene(&mut rt);
	rt.set_locations_active(client, &["/root".to_owned(), "/root/a".to_owned()]).unwrap();

	let events = rt.get_location_events(client, 10).unwrap();
	let paths: Vec<_> = events.iter().map(|e| e.path.as_str()).collect();
	assert_eq!(paths, ["/root", "/root/a"]);
	assert!(rt.get_location_events(client, 10).unwrap().is_empty());

	let mut txn = rt.create_transaction();
	let add = txn.create_op();
	txn.set_op_args(add, "AddOp", Attribute::Null);
	txn.set_op_inputs(add, vec![set]);
	txn.set_client_op(client, add);
	rt.commit(txn).unwrap();

	let events = rt.get_location_events(client, 10).unwrap();
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].path, "/root/a");
	assert_eq!(events[0].data.attrs().child("value").int_value(), Some(2));
}

#[test]
fn location_events_respect_max() {
	let mut rt = engine();
	let (client, _, _) = create_scene(&mut rt);
	rt.set_locations_active(client, &["/root".to_owned(), "/root/a".to_owned()]).unwrap();
	assert_eq!(rt.get_location_events(client, 1).unwrap().len(), 1);
	assert_eq!(rt.get_location_events(client, 1).unwrap().len(), 1);
	assert!(rt.get_location_events(client, 1).unwrap().is_empty());
}

#[test]
fn root_location_path_is_configurable() {
	let mut rt = GeolibRuntime::with_options(
		Arc::new(OpTypeRegistry::with_builtins()),
		GeolibOptions {
			root_location_path: "/world".to_owned(),
		},
	);
	let mut txn = rt.create_transaction();
	let op = txn.create_op();
	txn.set_op_args(op, "no-op", Attribute::Null);
	let client = txn.create_client();
	txn.set_client_op(client, op);
	rt.commit(txn).unwrap();

	assert!(rt.cook_location(client, "/world").unwrap().exists());
	assert!(!rt.cook_location(client, "/root").unwrap().exists());

	rt.set_options(GeolibOptions::default());
	assert_eq!(rt.root_location_path(), "/root");
	assert!(rt.cook_location(client, "/root").unwrap().exists());
}

#[test]
fn remove_client_forgets_it() {
	let mut rt = engine();
	let (client, _, _) = create_scene(&mut rt);
	assert!(rt.remove_client(client));
	assert!(!rt.has_client(client));
	assert!(!rt.remove_client(client));
}

#[test]
fn registry_lists_and_describes_builtins() {
	let rt = engine();
	let names = rt.registered_op_types();
	for expected in ["AddOp", "AttributeSet", "ConstantOp", "LocationCreate", "Merge", "Prune", "no-op"] {
		assert!(names.iter().any(|n| n == expected), "missing {expected}");
	}
	let described = rt.describe_op("AddOp").unwrap();
	assert_eq!(described.child("opType").str_value(), Some("AddOp"));
	assert!(described.child("args.amount").is_valid());
	assert!(rt.describe_op("Nope").is_none());
}

#[test]
fn constant_op_merges_args_onto_existing_locations() {
	let mut rt = engine();
	let mut txn = rt.create_transaction();
	let constant = txn.create_op();
	txn.set_op_args(constant, "ConstantOp", group(&[("shared", "yes".into())]));
	let client = txn.create_client();
	txn.set_client_op(client, constant);
	rt.commit(txn).unwrap();

	let root = rt.cook_location(client, "/root").unwrap();
	assert_eq!(root.attrs().child("shared").str_value(), Some("yes"));
	assert!(!rt.cook_location(client, "/root/none").unwrap().exists());
}
