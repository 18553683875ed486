use kodachi_attribute::{Attribute, GroupAttribute, IntAttribute};

use super::describe;
use crate::location::LocationData;
use crate::op_type::{CookContext, OpType};

/// Copies every arg child onto every existing location.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantOp;

impl OpType for ConstantOp {
	fn name(&self) -> &'static str {
		"ConstantOp"
	}

	fn describe(&self) -> GroupAttribute {
		describe(self.name(), &[("*", "Attribute")])
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		let input = ctx.primary();
		let Some(args) = ctx.args().as_group() else {
			return input.clone();
		};
		if !input.exists() || args.is_empty() {
			return input.clone();
		}
		let mut out = input.to_builder();
		out.merge_attrs(args);
		out.build()
	}
}

/// Adds `amount` to every value of the int attribute `attr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddOp;

impl OpType for AddOp {
	fn name(&self) -> &'static str {
		"AddOp"
	}

	fn describe(&self) -> GroupAttribute {
		describe(self.name(), &[("attr", "StringAttribute"), ("amount", "IntAttribute")])
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		let input = ctx.primary();
		let attr = ctx.args().child("attr");
		let attr = attr.str_value().unwrap_or("value");
		let amount = ctx.args().child("amount").int_value().unwrap_or(1);

		let current = input.attrs().child(attr);
		let Some(values) = current.as_int() else {
			return input.clone();
		};
		let updated: Vec<i32> = values.values().iter().map(|v| v.wrapping_add(amount)).collect();
		let mut out = input.to_builder();
		out.set_attr(attr, IntAttribute::new(updated));
		out.build()
	}
}

/// Merges `attrs` onto the location named by `location`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeSet;

impl OpType for AttributeSet {
	fn name(&self) -> &'static str {
		"AttributeSet"
	}

	fn describe(&self) -> GroupAttribute {
		describe(self.name(), &[("location", "StringAttribute"), ("attrs", "GroupAttribute")])
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		let input = ctx.primary();
		let target = ctx.args().child("location");
		if target.str_value() != Some(ctx.path()) || !input.exists() {
			return input.clone();
		}
		let attrs = ctx.args().child("attrs");
		let Attribute::Group(attrs) = attrs else {
			return input.clone();
		};
		let mut out = input.to_builder();
		out.merge_attrs(&attrs);
		out.build()
	}
}
