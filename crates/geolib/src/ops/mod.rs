//! Built-in operator types.
//!
//! | Type | Args | Effect |
//! |---|---|---|
//! | `no-op` | none | passes the first input through |
//! | `ConstantOp` | any group | copies every arg child onto every existing location |
//! | `AddOp` | `attr` (default `value`), `amount` (default 1) | adds to an int attribute |
//! | `AttributeSet` | `location`, `attrs` | merges `attrs` onto one location |
//! | `LocationCreate` | `paths`, `attrs` | creates locations and their ancestors |
//! | `Prune` | `paths` | removes locations and their descendants |
//! | `Merge` | none | unions every input; earlier inputs win conflicts |

mod attrs;
mod hierarchy;

use kodachi_attribute::{Attribute, GroupAttribute};

pub use attrs::{AddOp, AttributeSet, ConstantOp};
pub use hierarchy::{LocationCreate, Merge, Prune};

use crate::location::LocationData;
use crate::op_type::{CookContext, OpType, OpTypeRegistry};

/// Attribute holding the error category of an error location.
pub const ERROR_TYPE: &str = "error";

/// Passes its first input through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOp;

impl OpType for NoOp {
	fn name(&self) -> &'static str {
		"no-op"
	}

	fn cook(&self, ctx: &CookContext<'_>) -> LocationData {
		ctx.primary().clone()
	}
}

pub(crate) fn register_builtins(registry: &mut OpTypeRegistry) {
	registry.register(NoOp);
	registry.register(ConstantOp);
	registry.register(AddOp);
	registry.register(AttributeSet);
	registry.register(LocationCreate);
	registry.register(Prune);
	registry.register(Merge);
}

/// Location reporting a cook failure: it exists, is typed `error`, and keeps the
/// children of `input` so traversal can continue below it.
pub fn error_location(input: &LocationData, message: &str) -> LocationData {
	let mut builder = input.to_builder();
	builder.set_exists(true).replace_attrs(&GroupAttribute::default());
	builder.set_attr("type", ERROR_TYPE).set_attr("errorMessage", message);
	builder.build()
}

/// String values of `args.<name>`, or nothing.
pub(crate) fn string_list(args: &Attribute, name: &str) -> Vec<String> {
	args.child(name).as_string().map(|a| a.values().to_vec()).unwrap_or_default()
}

pub(crate) fn describe(op_type: &'static str, args: &[(&str, &str)]) -> GroupAttribute {
	let arg_types = GroupAttribute::new(args.iter().map(|(name, ty)| (*name, Attribute::from(*ty))));
	GroupAttribute::new([("opType", Attribute::from(op_type)), ("args", Attribute::Group(arg_types))])
}
