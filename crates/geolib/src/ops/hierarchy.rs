use kodachi_attribute::{Attribute, GroupAttribute};

use super::{describe, string_list};
use crate::location::{LocationBuilder, LocationData};
use crate::op_type::{CookContext, OpType};
use crate::path;

/// Creates each of `paths` (and their ancestors), setting `attrs` on the created leaves.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationCreate;

impl OpType for LocationCreate {
	fn name(&self) -> &'static str {
		"LocationCreate"
	}

	fn describe(&self) -> GroupAttribute {
		describe(self.name(), &[("paths", "StringAttribute"), ("attrs", "GroupAttribute")])
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		let input = ctx.primary();
		let here = ctx.path();
		let mut out: Option<LocationBuilder> = None;

		for created in string_list(ctx.args(), "paths") {
			if created == here {
				let builder = out.get_or_insert_with(|| input.to_builder());
				builder.set_exists(true);
				if let Attribute::Group(attrs) = ctx.args().child("attrs") {
					builder.merge_attrs(&attrs);
				}
			} else if let Some(child) = path::child_towards(here, &created) {
				let builder = out.get_or_insert_with(|| input.to_builder());
				builder.set_exists(true).add_child(child);
			}
		}

		match out {
			Some(builder) => builder.build(),
			None => input.clone(),
		}
	}
}

/// Removes each of `paths` and everything below them.
#[derive(Debug, Default, Clone, Copy)]
pub struct Prune;

impl OpType for Prune {
	fn name(&self) -> &'static str {
		"Prune"
	}

	fn describe(&self) -> GroupAttribute {
		describe(self.name(), &[("paths", "StringAttribute")])
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		let input = ctx.primary();
		let pruned = string_list(ctx.args(), "paths");
		if pruned.iter().any(|p| path::is_at_or_below(p, ctx.path())) {
			return LocationData::missing();
		}
		if !input.exists() {
			return input.clone();
		}
		let doomed: Vec<&str> = pruned.iter().filter(|p| path::parent(p) == Some(ctx.path())).map(|p| path::leaf_name(p)).collect();
		if doomed.is_empty() {
			return input.clone();
		}
		let mut out = input.to_builder();
		for name in doomed {
			out.remove_child(name);
		}
		out.build()
	}
}

/// Unions every input. Earlier inputs win attribute conflicts; children keep first-seen order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Merge;

impl OpType for Merge {
	fn name(&self) -> &'static str {
		"Merge"
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		if ctx.input_count() <= 1 {
			return ctx.primary().clone();
		}
		let existing: Vec<&LocationData> = ctx.inputs().iter().filter(|input| input.exists()).collect();
		if existing.is_empty() {
			return LocationData::missing();
		}

		let mut out = LocationBuilder::new();
		out.set_exists(true);
		for input in existing.iter().rev() {
			out.merge_attrs(input.attrs());
		}
		for input in &existing {
			for child in input.potential_children().iter_str() {
				out.add_child(child);
			}
		}
		out.build()
	}
}
