use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn sample_group() -> GroupAttribute {
	let mut gb = GroupBuilder::new();
	gb.set("type", "polymesh").set("geometry.point.P", vec![1, 2, 3]).set("geometry.arbitrary.st", 0.5f32);
	gb.build(BuildMode::Flush)
}

#[test]
fn test_equal_content_equal_hash() {
	let a = sample_group();
	let b = sample_group();
	assert_eq!(a.hash(), b.hash());
	assert_eq!(a, b);
	assert_eq!(Attribute::from(a), Attribute::from(b));
}

#[test]
fn test_hash_distinguishes_types_with_equal_bits() {
	let int = Attribute::from(0);
	let float = Attribute::from(0.0f32);
	assert_ne!(int.hash(), float.hash());
	assert_ne!(int, float);
}

#[test]
fn test_child_order_affects_hash() {
	let ab = GroupAttribute::new([("a", Attribute::from(1)), ("b", Attribute::from(2))]);
	let ba = GroupAttribute::new([("b", Attribute::from(2)), ("a", Attribute::from(1))]);
	assert_ne!(ab.hash(), ba.hash());
}

#[test]
fn test_dotted_lookup_and_null_sentinel() {
	let group = sample_group();
	assert_eq!(group.child("type").str_value(), Some("polymesh"));
	assert_eq!(group.child("geometry.point.P").as_int().map(|a| a.values().to_vec()), Some(vec![1, 2, 3]));
	assert!(!group.child("geometry.missing").is_valid());
	assert!(!group.child("type.nested").is_valid());
	assert!(!Attribute::Null.child("anything").is_valid());
}

#[test]
fn test_repeated_name_keeps_position() {
	let group = GroupAttribute::new([("a", Attribute::from(1)), ("b", Attribute::from(2)), ("a", Attribute::from(3))]);
	assert_eq!(group.names().collect::<Vec<_>>(), vec!["a", "b"]);
	assert_eq!(group.child("a").int_value(), Some(3));
}

#[test]
fn test_builder_set_replaces_value_with_group() {
	let mut gb = GroupBuilder::new();
	gb.set("a", 1);
	gb.set("a.b", 2);
	let group = gb.build(BuildMode::Flush);
	assert_eq!(group.child("a.b").int_value(), Some(2));
	assert!(gb.is_empty());
}

#[test]
fn test_builder_set_descends_into_existing_group_value() {
	let mut gb = GroupBuilder::from_group(&sample_group());
	gb.set("geometry.point.N", vec![0, 1, 0]);
	let group = gb.build(BuildMode::Retain);
	assert!(group.child("geometry.point.P").is_valid());
	assert!(group.child("geometry.point.N").is_valid());
	assert!(!gb.is_empty());
}

#[test]
fn test_builder_del() {
	let mut gb = GroupBuilder::from_group(&sample_group());
	assert!(gb.del("geometry.point.P"));
	assert!(!gb.del("geometry.point.P"));
	assert!(gb.del("type"));
	let group = gb.build(BuildMode::Flush);
	assert!(!group.child("type").is_valid());
	assert!(group.child("geometry.point").as_group().is_some_and(GroupAttribute::is_empty));
}

#[test]
fn test_update_is_shallow_and_deep_update_merges() {
	let base = GroupAttribute::new([("g", Attribute::from(GroupAttribute::new([("x", Attribute::from(1))])))]);
	let incoming = GroupAttribute::new([("g", Attribute::from(GroupAttribute::new([("y", Attribute::from(2))])))]);

	let mut shallow = GroupBuilder::from_group(&base);
	shallow.update(&incoming);
	let shallow = shallow.build(BuildMode::Flush);
	assert!(!shallow.child("g.x").is_valid());
	assert_eq!(shallow.child("g.y").int_value(), Some(2));

	let mut deep = GroupBuilder::from_group(&base);
	deep.deep_update(&incoming);
	let deep = deep.build(BuildMode::Flush);
	assert_eq!(deep.child("g.x").int_value(), Some(1));
	assert_eq!(deep.child("g.y").int_value(), Some(2));
}

#[test]
fn test_float_equality_is_bitwise() {
	assert_eq!(Attribute::from(f32::NAN), Attribute::from(f32::NAN));
	assert_ne!(Attribute::from(0.0f64), Attribute::from(-0.0f64));
}

proptest! {
	#[test]
	fn prop_string_arrays_hash_by_content(values in proptest::collection::vec(".{0,8}", 0..6)) {
		let a = StringAttribute::new(values.clone());
		let b = StringAttribute::new(values);
		prop_assert_eq!(a.hash(), b.hash());
		prop_assert_eq!(a, b);
	}

	#[test]
	fn prop_int_arrays_differ_when_content_differs(mut values in proptest::collection::vec(any::<i32>(), 1..8)) {
		let a = IntAttribute::new(values.clone());
		values[0] = values[0].wrapping_add(1);
		let b = IntAttribute::new(values);
		prop_assert_ne!(a, b);
	}
}
