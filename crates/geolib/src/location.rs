use kodachi_attribute::{Attribute, BuildMode, GroupAttribute, GroupBuilder, Hash, StringAttribute};

/// Cooked state of one scene-graph location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationData {
	exists: bool,
	attrs: GroupAttribute,
	potential_children: StringAttribute,
	hash: Hash,
}

impl Default for LocationData {
	fn default() -> Self {
		Self::missing()
	}
}

impl LocationData {
	/// An existing location.
	pub fn new(attrs: GroupAttribute, potential_children: Vec<String>) -> Self {
		Self::from_parts(true, attrs, StringAttribute::new(potential_children))
	}

	/// A location that does not exist.
	pub fn missing() -> Self {
		Self::from_parts(false, GroupAttribute::default(), StringAttribute::new(Vec::<String>::new()))
	}

	fn from_parts(exists: bool, attrs: GroupAttribute, potential_children: StringAttribute) -> Self {
		let hash = GroupAttribute::new([
			("exists", Attribute::from(i32::from(exists))),
			("attrs", Attribute::Group(attrs.clone())),
			("children", Attribute::String(potential_children.clone())),
		])
		.hash();
		Self {
			exists,
			attrs,
			potential_children,
			hash,
		}
	}

	pub fn exists(&self) -> bool {
		self.exists
	}

	pub fn attrs(&self) -> &GroupAttribute {
		&self.attrs
	}

	pub fn potential_children(&self) -> &StringAttribute {
		&self.potential_children
	}

	/// Content hash over existence, attributes and children.
	pub fn hash(&self) -> Hash {
		self.hash
	}

	/// Starts an edit of this location.
	pub fn to_builder(&self) -> LocationBuilder {
		LocationBuilder {
			exists: self.exists,
			attrs: GroupBuilder::from_group(&self.attrs),
			children: self.potential_children.values().to_vec(),
		}
	}
}

/// Mutable copy of a [`LocationData`] used by op implementations.
#[derive(Debug, Clone, Default)]
pub struct LocationBuilder {
	exists: bool,
	attrs: GroupBuilder,
	children: Vec<String>,
}

impl LocationBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn exists(&self) -> bool {
		self.exists
	}

	pub fn set_exists(&mut self, exists: bool) -> &mut Self {
		self.exists = exists;
		self
	}

	pub fn set_attr(&mut self, path: &str, value: impl Into<Attribute>) -> &mut Self {
		self.attrs.set(path, value);
		self
	}

	pub fn merge_attrs(&mut self, attrs: &GroupAttribute) -> &mut Self {
		self.attrs.deep_update(attrs);
		self
	}

	pub fn replace_attrs(&mut self, attrs: &GroupAttribute) -> &mut Self {
		self.attrs = GroupBuilder::from_group(attrs);
		self
	}

	/// Appends a child name unless already present.
	pub fn add_child(&mut self, name: &str) -> &mut Self {
		if !self.children.iter().any(|c| c == name) {
			self.children.push(name.to_owned());
		}
		self
	}

	pub fn remove_child(&mut self, name: &str) -> &mut Self {
		self.children.retain(|c| c != name);
		self
	}

	pub fn build(mut self) -> LocationData {
		if !self.exists {
			return LocationData::missing();
		}
		LocationData::new(self.attrs.build(BuildMode::Flush), self.children)
	}
}

/// Notification that an active location cooked to new data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationEvent {
	pub path: String,
	pub data: LocationData,
}
