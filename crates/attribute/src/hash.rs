use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;

const LANE_A_SEED: u64 = 0x243f_6a88_85a3_08d3;
const LANE_B_SEED: u64 = 0x1319_8a2e_0370_7344;

/// 128-bit content hash of an attribute value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash {
	hi: u64,
	lo: u64,
}

impl Hash {
	/// Builds a hash from its two 64-bit halves.
	pub const fn from_parts(hi: u64, lo: u64) -> Self {
		Self { hi, lo }
	}

	/// Returns the high and low halves.
	pub const fn parts(&self) -> (u64, u64) {
		(self.hi, self.lo)
	}

	/// Returns true for the all-zero hash.
	pub const fn is_zero(&self) -> bool {
		self.hi == 0 && self.lo == 0
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:016x}{:016x}", self.hi, self.lo)
	}
}

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Hash({self})")
	}
}

/// Two independently seeded Fx lanes fed with the same bytes.
pub(crate) struct HashState {
	a: FxHasher,
	b: FxHasher,
}

impl HashState {
	pub(crate) fn new(tag: u8) -> Self {
		let mut a = FxHasher::default();
		let mut b = FxHasher::default();
		a.write_u64(LANE_A_SEED);
		b.write_u64(LANE_B_SEED);
		a.write_u8(tag);
		b.write_u8(tag.rotate_left(3) ^ 0x5a);
		Self { a, b }
	}

	pub(crate) fn write_hash(&mut self, hash: Hash) {
		self.write_u64(hash.hi);
		self.write_u64(hash.lo);
	}

	pub(crate) fn finish_hash(&self) -> Hash {
		Hash {
			hi: self.a.finish(),
			lo: self.b.finish().rotate_left(17) ^ self.a.finish(),
		}
	}
}

impl Hasher for HashState {
	fn finish(&self) -> u64 {
		self.a.finish()
	}

	fn write(&mut self, bytes: &[u8]) {
		self.a.write(bytes);
		// Lane b sees the bytes in reverse so the lanes diverge on equal prefixes.
		for byte in bytes.iter().rev() {
			self.b.write_u8(*byte);
		}
		self.b.write_usize(bytes.len());
	}

	fn write_u64(&mut self, value: u64) {
		self.a.write_u64(value);
		self.b.write_u64(value.rotate_left(29) ^ LANE_B_SEED);
	}
}
