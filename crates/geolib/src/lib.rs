//! Single-threaded operator-graph cooking engine.
//!
//! # Purpose
//!
//! [`GeolibRuntime`] holds one operator DAG and cooks scene-graph locations against it.
//! It is single-threaded: all mutation goes through `&mut self`, and the
//! thread-safe layer above keeps one instance per thread rather than sharing one.
//!
//! # Mental model
//!
//! * Graph edits are staged on a [`GeolibTransaction`] and applied by
//!   [`GeolibRuntime::commit`], which returns a strictly increasing [`CommitId`].
//! * A client names a terminal op; cooking a path evaluates every op reachable from it
//!   at that same path, inputs first.
//! * Cooked results are memoized per `(op, path)` until evicted, flushed, or invalidated
//!   by a commit that changes an existing op.
//!
//! # Invariants
//!
//! * Native ids are never reused inside one engine instance.
//! * Committed input lists never form a cycle (checked by [`GeolibRuntime::commit`]).
//! * A missing location is data (`exists == false`), not an error.

mod error;
mod ids;
mod location;
mod op_type;
pub mod ops;
pub mod path;
mod runtime;

pub use error::GeolibError;
pub use ids::{CommitId, NativeClientId, NativeOpId};
pub use location::{LocationBuilder, LocationData, LocationEvent};
pub use op_type::{CookContext, OpType, OpTypeRegistry};
pub use runtime::{CookStats, GeolibOptions, GeolibRuntime, GeolibTransaction};

#[cfg(test)]
mod tests;
