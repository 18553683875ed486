use std::fmt;
use std::hash::Hasher;
use std::sync::{Arc, LazyLock};

use crate::attr::Attribute;
use crate::hash::{Hash, HashState};

const GROUP_TAG: u8 = 16;

static EMPTY: LazyLock<GroupAttribute> = LazyLock::new(|| GroupAttribute::from_unique(Vec::new()));

struct GroupInner {
	children: Vec<(String, Attribute)>,
	hash: Hash,
}

/// Ordered, named children.
///
/// Child lookup accepts dotted paths (`"geometry.point.P"`); a miss yields
/// [`Attribute::Null`].
#[derive(Clone)]
pub struct GroupAttribute {
	inner: Arc<GroupInner>,
}

impl Default for GroupAttribute {
	fn default() -> Self {
		EMPTY.clone()
	}
}

impl GroupAttribute {
	/// Builds a group from `(name, value)` pairs.
	///
	/// A repeated name replaces the earlier value in place.
	pub fn new<N: Into<String>>(children: impl IntoIterator<Item = (N, Attribute)>) -> Self {
		let mut unique: Vec<(String, Attribute)> = Vec::new();
		for (name, value) in children {
			let name = name.into();
			match unique.iter_mut().find(|(existing, _)| *existing == name) {
				Some(slot) => slot.1 = value,
				None => unique.push((name, value)),
			}
		}
		Self::from_unique(unique)
	}

	pub(crate) fn from_unique(children: Vec<(String, Attribute)>) -> Self {
		let mut state = HashState::new(GROUP_TAG);
		state.write_usize(children.len());
		for (name, value) in &children {
			state.write(name.as_bytes());
			state.write_u8(0);
			state.write_hash(value.hash());
		}
		Self {
			inner: Arc::new(GroupInner {
				hash: state.finish_hash(),
				children,
			}),
		}
	}

	pub fn hash(&self) -> Hash {
		self.inner.hash
	}

	pub fn len(&self) -> usize {
		self.inner.children.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.children.is_empty()
	}

	/// Looks up a direct child by name.
	pub fn get(&self, name: &str) -> Option<&Attribute> {
		self.inner.children.iter().find(|(n, _)| n == name).map(|(_, v)| v)
	}

	/// Resolves a dotted path, returning `Null` on a miss.
	pub fn child(&self, path: &str) -> Attribute {
		let mut current = self;
		let mut segments = path.split('.').peekable();
		while let Some(segment) = segments.next() {
			let Some(value) = current.get(segment) else {
				return Attribute::Null;
			};
			if segments.peek().is_none() {
				return value.clone();
			}
			match value {
				Attribute::Group(group) => current = group,
				_ => return Attribute::Null,
			}
		}
		Attribute::Null
	}

	/// Child at `index` in insertion order.
	pub fn child_at(&self, index: usize) -> Option<(&str, &Attribute)> {
		self.inner.children.get(index).map(|(n, v)| (n.as_str(), v))
	}

	pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Attribute)> {
		self.inner.children.iter().map(|(n, v)| (n.as_str(), v))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.inner.children.iter().map(|(n, _)| n.as_str())
	}
}

impl PartialEq for GroupAttribute {
	fn eq(&self, other: &Self) -> bool {
		if Arc::ptr_eq(&self.inner, &other.inner) {
			return true;
		}
		self.inner.hash == other.inner.hash && self.inner.children == other.inner.children
	}
}

impl Eq for GroupAttribute {}

impl fmt::Debug for GroupAttribute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut map = f.debug_map();
		for (name, value) in self.iter() {
			map.entry(&name, value);
		}
		map.finish()
	}
}

impl<N: Into<String>> FromIterator<(N, Attribute)> for GroupAttribute {
	fn from_iter<I: IntoIterator<Item = (N, Attribute)>>(iter: I) -> Self {
		Self::new(iter)
	}
}
