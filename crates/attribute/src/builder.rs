use indexmap::IndexMap;

use crate::attr::Attribute;
use crate::group::GroupAttribute;

/// What [`GroupBuilder::build`] does with the builder's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
	/// Empty the builder after building.
	#[default]
	Flush,
	/// Keep the contents for further edits.
	Retain,
}

#[derive(Debug, Clone)]
enum Node {
	Value(Attribute),
	Group(GroupBuilder),
}

impl Node {
	fn into_attribute(self) -> Attribute {
		match self {
			Node::Value(value) => value,
			Node::Group(builder) => Attribute::Group(builder.into_group()),
		}
	}

	fn to_attribute(&self) -> Attribute {
		match self {
			Node::Value(value) => value.clone(),
			Node::Group(builder) => Attribute::Group(builder.snapshot()),
		}
	}
}

/// Mutable staging area for a [`GroupAttribute`].
#[derive(Debug, Clone, Default)]
pub struct GroupBuilder {
	children: IndexMap<String, Node>,
}

impl GroupBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts from the children of an existing group.
	pub fn from_group(group: &GroupAttribute) -> Self {
		let mut builder = Self::new();
		builder.update(group);
		builder
	}

	pub fn is_empty(&self) -> bool {
		self.children.is_empty()
	}

	pub fn len(&self) -> usize {
		self.children.len()
	}

	/// Sets `value` at a dotted `path`, creating intermediate groups.
	pub fn set(&mut self, path: &str, value: impl Into<Attribute>) -> &mut Self {
		self.set_path(path, value.into());
		self
	}

	fn set_path(&mut self, path: &str, value: Attribute) {
		match path.split_once('.') {
			None => {
				self.children.insert(path.to_owned(), Node::Value(value));
			}
			Some((head, rest)) => {
				let node = self.children.entry(head.to_owned()).or_insert_with(|| Node::Group(GroupBuilder::new()));
				if let Node::Value(existing) = &*node {
					let builder = match existing {
						Attribute::Group(group) => GroupBuilder::from_group(group),
						_ => GroupBuilder::new(),
					};
					*node = Node::Group(builder);
				}
				if let Node::Group(child) = node {
					child.set_path(rest, value);
				}
			}
		}
	}

	/// Removes the value at a dotted `path`. Returns true if something was removed.
	pub fn del(&mut self, path: &str) -> bool {
		match path.split_once('.') {
			None => self.children.shift_remove(path).is_some(),
			Some((head, rest)) => {
				let Some(node) = self.children.get_mut(head) else {
					return false;
				};
				if let Node::Value(Attribute::Group(group)) = &*node {
					let builder = GroupBuilder::from_group(group);
					*node = Node::Group(builder);
				}
				match node {
					Node::Group(builder) => builder.del(rest),
					Node::Value(_) => false,
				}
			}
		}
	}

	/// Copies every direct child of `group`, replacing same-named children.
	pub fn update(&mut self, group: &GroupAttribute) -> &mut Self {
		for (name, value) in group.iter() {
			self.children.insert(name.to_owned(), Node::Value(value.clone()));
		}
		self
	}

	/// Recursively merges `group`, descending into children that are groups on both sides.
	pub fn deep_update(&mut self, group: &GroupAttribute) -> &mut Self {
		for (name, value) in group.iter() {
			let Attribute::Group(incoming) = value else {
				self.children.insert(name.to_owned(), Node::Value(value.clone()));
				continue;
			};
			match self.children.get_mut(name) {
				Some(node) if matches!(node, Node::Group(_) | Node::Value(Attribute::Group(_))) => {
					if let Node::Value(Attribute::Group(existing)) = &*node {
						let builder = GroupBuilder::from_group(existing);
						*node = Node::Group(builder);
					}
					if let Node::Group(builder) = node {
						builder.deep_update(incoming);
					}
				}
				_ => {
					self.children.insert(name.to_owned(), Node::Value(value.clone()));
				}
			}
		}
		self
	}

	/// Produces a group from the staged contents.
	pub fn build(&mut self, mode: BuildMode) -> GroupAttribute {
		match mode {
			BuildMode::Flush => std::mem::take(self).into_group(),
			BuildMode::Retain => self.snapshot(),
		}
	}

	fn snapshot(&self) -> GroupAttribute {
		GroupAttribute::from_unique(self.children.iter().map(|(name, node)| (name.clone(), node.to_attribute())).collect())
	}

	fn into_group(self) -> GroupAttribute {
		GroupAttribute::from_unique(self.children.into_iter().map(|(name, node)| (name, node.into_attribute())).collect())
	}
}
