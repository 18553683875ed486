//! Error types for the runtime layer.
//!
//! Missing scene data is never an error here: a location that does not exist cooks to
//! a [`crate::LocationData`] whose `does_location_exist()` is false.

use std::path::PathBuf;

use kodachi_geolib::GeolibError;
use thiserror::Error;

use crate::op_id::KodachiOpId;

/// A string that is not a canonical 36-character op id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid op id '{input}'")]
pub struct ParseOpIdError {
	input: String,
}

impl ParseOpIdError {
	pub(crate) fn new(input: &str) -> Self {
		Self { input: input.to_owned() }
	}

	pub fn input(&self) -> &str {
		&self.input
	}
}

/// Reasons a commit is rejected. A rejected commit changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
	/// The runtime that issued the transaction has been dropped.
	#[error("runtime has been dropped")]
	Expired,

	/// The transaction was created by a different runtime.
	#[error("transaction belongs to another runtime")]
	ForeignTransaction,

	/// An op handle from another runtime was staged.
	#[error("op {0} belongs to another runtime")]
	ForeignOp(KodachiOpId),

	/// A client handle from another runtime was staged.
	#[error("client {0} belongs to another runtime")]
	ForeignClient(u64),

	/// An op that was never created by a committed or the current transaction.
	#[error("op {0} is unknown to this runtime")]
	UnknownOp(KodachiOpId),

	/// Args or inputs were staged for an op that is already committed.
	#[error("op {0} is already committed and cannot change")]
	OpFrozen(KodachiOpId),

	/// Another op object with the same id was committed first.
	#[error("op id {0} is already taken")]
	DuplicateOpId(KodachiOpId),

	/// The staged inputs would make the op reachable from itself.
	#[error("input cycle through op {0}")]
	Cycle(KodachiOpId),

	#[error(transparent)]
	Engine(#[from] GeolibError),
}

/// Failures while replicating the committed graph into a thread engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
	/// A reachable op has no committed state.
	#[error("op {0} was never committed")]
	Uncommitted(KodachiOpId),

	#[error("thread engine rejected the replicated graph: {0}")]
	Engine(#[from] GeolibError),
}

/// Errors surfaced by [`crate::Runtime`] and [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
	/// A back-reference was resolved after its runtime was dropped.
	#[error("runtime has been dropped")]
	Expired,

	/// `Runtime::create` ran before `set_host`.
	#[error("plugin host not set; call kodachi_runtime::set_host first")]
	HostNotSet,

	/// The client was never bound to a terminal op.
	#[error("client has no op")]
	ClientOpNotSet,

	#[error(transparent)]
	Engine(#[from] GeolibError),

	#[error(transparent)]
	Sync(#[from] SyncError),

	#[error(transparent)]
	Commit(#[from] CommitError),

	#[error(transparent)]
	Graph(#[from] GraphError),
}

/// A serialized op tree that cannot be imported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
	#[error(transparent)]
	InvalidOpId(#[from] ParseOpIdError),

	/// Every op is used as an input, so there is no terminal op.
	#[error("op tree has no terminal op")]
	NoTerminalOp,
}

/// Misuse of an [`crate::OpTreeBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
	#[error(transparent)]
	Graph(#[from] GraphError),

	/// The op was not created by (or merged into) this builder.
	#[error("op {0} was not created by this builder")]
	ForeignOp(KodachiOpId),

	/// An op referenced as an input has no entry in the built graph.
	#[error("op {0} is missing from the graph")]
	MissingOp(KodachiOpId),
}

/// Installing the plugin host failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
	#[error("plugin host '{current}' is already set; cannot switch to '{requested}'")]
	AlreadySet { current: &'static str, requested: &'static str },

	#[error("plugin host api version {found} does not match {expected}")]
	VersionMismatch { expected: u32, found: u32 },
}

/// Errors loading [`crate::RuntimeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {}: {error}", path.display())]
	Io { path: PathBuf, error: std::io::Error },

	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
}
