use std::fmt;

/// Engine-local identifier of an op. Only meaningful inside the engine that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeOpId(pub(crate) u64);

/// Engine-local identifier of a cooking client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeClientId(pub(crate) u64);

/// Strictly increasing commit counter. Zero means "nothing committed yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitId(u64);

impl NativeOpId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl NativeClientId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl CommitId {
	pub const ZERO: CommitId = CommitId(0);

	pub const fn new(value: u64) -> Self {
		Self(value)
	}

	pub const fn get(self) -> u64 {
		self.0
	}

	/// The id following this one.
	#[must_use]
	pub const fn next(self) -> Self {
		Self(self.0 + 1)
	}
}

impl fmt::Display for NativeOpId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "op#{}", self.0)
	}
}

impl fmt::Display for NativeClientId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "client#{}", self.0)
	}
}

impl fmt::Display for CommitId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}
