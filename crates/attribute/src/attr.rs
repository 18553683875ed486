use std::fmt;
use std::hash::Hasher;
use std::sync::Arc;

use crate::group::GroupAttribute;
use crate::hash::{Hash, HashState};

const NULL_TAG: u8 = 0;

/// Element type storable in a [`DataAttribute`].
pub trait AttributeValue: Clone + fmt::Debug + Send + Sync + 'static {
	/// Type tag mixed into the content hash.
	const TAG: u8;
	/// Human readable type name.
	const TYPE_NAME: &'static str;

	/// Feeds the value into a hasher.
	fn hash_value<H: Hasher>(&self, state: &mut H);

	/// Content equality consistent with [`Self::hash_value`].
	fn same_value(&self, other: &Self) -> bool;
}

impl AttributeValue for i32 {
	const TAG: u8 = 1;
	const TYPE_NAME: &'static str = "IntAttribute";

	fn hash_value<H: Hasher>(&self, state: &mut H) {
		state.write_i32(*self);
	}

	fn same_value(&self, other: &Self) -> bool {
		self == other
	}
}

impl AttributeValue for f32 {
	const TAG: u8 = 2;
	const TYPE_NAME: &'static str = "FloatAttribute";

	fn hash_value<H: Hasher>(&self, state: &mut H) {
		state.write_u32(self.to_bits());
	}

	fn same_value(&self, other: &Self) -> bool {
		self.to_bits() == other.to_bits()
	}
}

impl AttributeValue for f64 {
	const TAG: u8 = 3;
	const TYPE_NAME: &'static str = "DoubleAttribute";

	fn hash_value<H: Hasher>(&self, state: &mut H) {
		state.write_u64(self.to_bits());
	}

	fn same_value(&self, other: &Self) -> bool {
		self.to_bits() == other.to_bits()
	}
}

impl AttributeValue for String {
	const TAG: u8 = 4;
	const TYPE_NAME: &'static str = "StringAttribute";

	fn hash_value<H: Hasher>(&self, state: &mut H) {
		state.write(self.as_bytes());
		state.write_u8(0xff);
	}

	fn same_value(&self, other: &Self) -> bool {
		self == other
	}
}

struct DataInner<T> {
	values: Box<[T]>,
	hash: Hash,
}

/// Immutable array of typed values.
pub struct DataAttribute<T: AttributeValue> {
	inner: Arc<DataInner<T>>,
}

pub type IntAttribute = DataAttribute<i32>;
pub type FloatAttribute = DataAttribute<f32>;
pub type DoubleAttribute = DataAttribute<f64>;
pub type StringAttribute = DataAttribute<String>;

impl<T: AttributeValue> DataAttribute<T> {
	/// Creates an attribute holding `values`.
	pub fn new(values: impl Into<Vec<T>>) -> Self {
		let values: Box<[T]> = values.into().into_boxed_slice();
		let mut state = HashState::new(T::TAG);
		state.write_usize(values.len());
		for value in values.iter() {
			value.hash_value(&mut state);
		}
		Self {
			inner: Arc::new(DataInner {
				hash: state.finish_hash(),
				values,
			}),
		}
	}

	/// Creates a single-value attribute.
	pub fn from_value(value: T) -> Self {
		Self::new(vec![value])
	}

	/// All values.
	pub fn values(&self) -> &[T] {
		&self.inner.values
	}

	/// First value, if any.
	pub fn value(&self) -> Option<&T> {
		self.inner.values.first()
	}

	pub fn len(&self) -> usize {
		self.inner.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.values.is_empty()
	}

	pub fn hash(&self) -> Hash {
		self.inner.hash
	}
}

impl StringAttribute {
	/// First value as `&str`.
	pub fn as_str(&self) -> Option<&str> {
		self.value().map(String::as_str)
	}

	/// Iterates values as `&str`.
	pub fn iter_str(&self) -> impl Iterator<Item = &str> {
		self.values().iter().map(String::as_str)
	}
}

impl<T: AttributeValue> Clone for DataAttribute<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: AttributeValue> PartialEq for DataAttribute<T> {
	fn eq(&self, other: &Self) -> bool {
		if Arc::ptr_eq(&self.inner, &other.inner) {
			return true;
		}
		self.inner.hash == other.inner.hash
			&& self.inner.values.len() == other.inner.values.len()
			&& self.inner.values.iter().zip(other.inner.values.iter()).all(|(a, b)| a.same_value(b))
	}
}

impl<T: AttributeValue> Eq for DataAttribute<T> {}

impl<T: AttributeValue> fmt::Debug for DataAttribute<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.len() == 1 {
			write!(f, "{}({:?})", T::TYPE_NAME, &self.inner.values[0])
		} else {
			write!(f, "{}({:?})", T::TYPE_NAME, &self.inner.values)
		}
	}
}

impl From<&str> for StringAttribute {
	fn from(value: &str) -> Self {
		Self::from_value(value.to_owned())
	}
}

impl From<String> for StringAttribute {
	fn from(value: String) -> Self {
		Self::from_value(value)
	}
}

impl From<&[&str]> for StringAttribute {
	fn from(values: &[&str]) -> Self {
		Self::new(values.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>())
	}
}

/// Any attribute value, including the invalid sentinel.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Attribute {
	/// The "invalid" value.
	#[default]
	Null,
	Int(IntAttribute),
	Float(FloatAttribute),
	Double(DoubleAttribute),
	String(StringAttribute),
	Group(GroupAttribute),
}

impl Attribute {
	/// False only for [`Attribute::Null`].
	pub fn is_valid(&self) -> bool {
		!matches!(self, Attribute::Null)
	}

	/// Content hash; every `Null` shares one hash.
	pub fn hash(&self) -> Hash {
		match self {
			Attribute::Null => HashState::new(NULL_TAG).finish_hash(),
			Attribute::Int(a) => a.hash(),
			Attribute::Float(a) => a.hash(),
			Attribute::Double(a) => a.hash(),
			Attribute::String(a) => a.hash(),
			Attribute::Group(g) => g.hash(),
		}
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Attribute::Null => "NullAttribute",
			Attribute::Int(_) => i32::TYPE_NAME,
			Attribute::Float(_) => f32::TYPE_NAME,
			Attribute::Double(_) => f64::TYPE_NAME,
			Attribute::String(_) => String::TYPE_NAME,
			Attribute::Group(_) => "GroupAttribute",
		}
	}

	pub fn as_int(&self) -> Option<&IntAttribute> {
		match self {
			Attribute::Int(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<&FloatAttribute> {
		match self {
			Attribute::Float(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_double(&self) -> Option<&DoubleAttribute> {
		match self {
			Attribute::Double(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_string(&self) -> Option<&StringAttribute> {
		match self {
			Attribute::String(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_group(&self) -> Option<&GroupAttribute> {
		match self {
			Attribute::Group(g) => Some(g),
			_ => None,
		}
	}

	/// First int value.
	pub fn int_value(&self) -> Option<i32> {
		self.as_int().and_then(|a| a.value().copied())
	}

	/// First string value.
	pub fn str_value(&self) -> Option<&str> {
		self.as_string().and_then(StringAttribute::as_str)
	}

	/// Child lookup that tolerates non-group values by returning `Null`.
	pub fn child(&self, path: &str) -> Attribute {
		match self {
			Attribute::Group(g) => g.child(path),
			_ => Attribute::Null,
		}
	}
}

impl fmt::Debug for Attribute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Attribute::Null => f.write_str("Null"),
			Attribute::Int(a) => a.fmt(f),
			Attribute::Float(a) => a.fmt(f),
			Attribute::Double(a) => a.fmt(f),
			Attribute::String(a) => a.fmt(f),
			Attribute::Group(g) => g.fmt(f),
		}
	}
}

impl From<i32> for Attribute {
	fn from(value: i32) -> Self {
		Attribute::Int(IntAttribute::from_value(value))
	}
}

impl From<f32> for Attribute {
	fn from(value: f32) -> Self {
		Attribute::Float(FloatAttribute::from_value(value))
	}
}

impl From<f64> for Attribute {
	fn from(value: f64) -> Self {
		Attribute::Double(DoubleAttribute::from_value(value))
	}
}

impl From<&str> for Attribute {
	fn from(value: &str) -> Self {
		Attribute::String(value.into())
	}
}

impl From<String> for Attribute {
	fn from(value: String) -> Self {
		Attribute::String(value.into())
	}
}

impl From<Vec<i32>> for Attribute {
	fn from(values: Vec<i32>) -> Self {
		Attribute::Int(IntAttribute::new(values))
	}
}

impl From<Vec<String>> for Attribute {
	fn from(values: Vec<String>) -> Self {
		Attribute::String(StringAttribute::new(values))
	}
}

impl From<IntAttribute> for Attribute {
	fn from(value: IntAttribute) -> Self {
		Attribute::Int(value)
	}
}

impl From<FloatAttribute> for Attribute {
	fn from(value: FloatAttribute) -> Self {
		Attribute::Float(value)
	}
}

impl From<DoubleAttribute> for Attribute {
	fn from(value: DoubleAttribute) -> Self {
		Attribute::Double(value)
	}
}

impl From<StringAttribute> for Attribute {
	fn from(value: StringAttribute) -> Self {
		Attribute::String(value)
	}
}

impl From<GroupAttribute> for Attribute {
	fn from(value: GroupAttribute) -> Self {
		Attribute::Group(value)
	}
}
