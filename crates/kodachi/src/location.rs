use kodachi_attribute::{Attribute, GroupAttribute, Hash, StringAttribute};
use kodachi_geolib::{LocationData as CookedLocation, path};

/// Read-only view of one cooked scene location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationData {
	path: String,
	data: CookedLocation,
}

impl LocationData {
	pub(crate) fn new(path: impl Into<String>, data: CookedLocation) -> Self {
		Self { path: path.into(), data }
	}

	pub fn location_path(&self) -> &str {
		&self.path
	}

	pub fn hash(&self) -> Hash {
		self.data.hash()
	}

	pub fn does_location_exist(&self) -> bool {
		self.data.exists()
	}

	pub fn attrs(&self) -> &GroupAttribute {
		self.data.attrs()
	}

	/// Dotted attribute lookup; `Attribute::Null` when absent.
	pub fn attr(&self, name: &str) -> Attribute {
		self.data.attrs().child(name)
	}

	pub fn potential_children(&self) -> &StringAttribute {
		self.data.potential_children()
	}

	/// Full paths of the potential children.
	pub fn child_paths(&self) -> impl Iterator<Item = String> + '_ {
		self.data.potential_children().iter_str().map(|child| path::join(&self.path, child))
	}

	pub fn data(&self) -> &CookedLocation {
		&self.data
	}
}
