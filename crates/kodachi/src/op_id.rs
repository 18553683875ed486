use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ParseOpIdError;

/// Length of the canonical hyphenated form.
pub const OP_ID_STR_LEN: usize = 36;

/// Process-wide identity of an op, stable across engine instances and serialization.
///
/// The default value is the null id, which never names a valid op.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KodachiOpId(Uuid);

impl KodachiOpId {
	pub const NULL: Self = Self(Uuid::nil());

	/// Fresh random (v4) id.
	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub const fn from_uuid(uuid: Uuid) -> Self {
		Self(uuid)
	}

	pub const fn from_bytes(bytes: [u8; 16]) -> Self {
		Self(Uuid::from_bytes(bytes))
	}

	pub const fn as_uuid(&self) -> &Uuid {
		&self.0
	}

	pub const fn as_bytes(&self) -> &[u8; 16] {
		self.0.as_bytes()
	}

	pub fn is_null(&self) -> bool {
		self.0.is_nil()
	}

	pub fn is_valid(&self) -> bool {
		!self.is_null()
	}
}

impl fmt::Display for KodachiOpId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0.hyphenated(), f)
	}
}

impl fmt::Debug for KodachiOpId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "KodachiOpId({})", self.0.hyphenated())
	}
}

/// Accepts only the 36-character hyphenated form.
impl FromStr for KodachiOpId {
	type Err = ParseOpIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() != OP_ID_STR_LEN {
			return Err(ParseOpIdError::new(s));
		}
		Uuid::try_parse(s).map(Self).map_err(|_| ParseOpIdError::new(s))
	}
}

impl From<Uuid> for KodachiOpId {
	fn from(uuid: Uuid) -> Self {
		Self(uuid)
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn default_is_null() {
		let id = KodachiOpId::default();
		assert!(id.is_null());
		assert!(!id.is_valid());
		assert_eq!(id, KodachiOpId::NULL);
		assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
	}

	#[test]
	fn generated_ids_are_distinct_and_valid() {
		let a = KodachiOpId::generate();
		let b = KodachiOpId::generate();
		assert_ne!(a, b);
		assert!(a.is_valid());
		assert_eq!(a.to_string().len(), OP_ID_STR_LEN);
	}

	#[test]
	fn rejects_non_canonical_forms() {
		let id = KodachiOpId::generate();
		let simple = id.as_uuid().simple().to_string();
		assert!(simple.parse::<KodachiOpId>().is_err());
		assert!(format!("{{{id}}}").parse::<KodachiOpId>().is_err());
		assert!("not-an-op-id".parse::<KodachiOpId>().is_err());
		assert!("zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz".parse::<KodachiOpId>().is_err());
	}

	#[test]
	fn uppercase_parses_to_the_same_id() {
		let id = KodachiOpId::generate();
		let upper = id.to_string().to_uppercase();
		assert_eq!(upper.parse::<KodachiOpId>().unwrap(), id);
	}

	proptest! {
		#[test]
		fn display_parse_roundtrip(bytes in any::<[u8; 16]>()) {
			let id = KodachiOpId::from_bytes(bytes);
			let parsed: KodachiOpId = id.to_string().parse().unwrap();
			prop_assert_eq!(parsed, id);
			prop_assert_eq!(parsed.as_bytes(), &bytes);
		}

		#[test]
		fn ordering_follows_bytes(a in any::<[u8; 16]>(), b in any::<[u8; 16]>()) {
			prop_assert_eq!(KodachiOpId::from_bytes(a).cmp(&KodachiOpId::from_bytes(b)), a.cmp(&b));
		}
	}
}
