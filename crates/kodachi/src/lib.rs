//! Thread-safe operator-graph runtime.
//!
//! # Purpose
//!
//! A [`Runtime`] owns one master operator graph that any thread may edit through
//! [`Transaction`]s, and lets any number of threads cook scene locations from it at
//! the same time. Each thread cooks on a private engine into which the committed graph
//! is replicated lazily, so cooking never contends on the master.
//!
//! # Mental model
//!
//! * [`Op`] handles are created on a transaction and frozen by the commit that
//!   publishes them. One handle exists per [`KodachiOpId`].
//! * [`Runtime::commit`] validates, applies to the master engine, publishes the ops,
//!   binds clients, then bumps the commit counter.
//! * A [`Client`] names a terminal op. Cooking through it on a [`ThreadKey`] first
//!   compares the counter with that key's last sync and, when stale, copies the
//!   reachable graph into the key's engine with an [`OpTreeSynchronizer`].
//! * Replicated state lives until [`Runtime::release_thread`] or the runtime drops.
//!
//! # Invariants
//!
//! - Must give every op id exactly one shared handle, whichever thread looks it up.
//!   - Enforced in: `RuntimeInner::apply`, [`Transaction::get_or_create_op`]
//!   - Tested by: [`crate::invariants::test_op_identity_is_shared`]
//!   - Failure symptom: Two handles for one id; rebinding a client replicates twice.
//!
//! - Must hand out strictly increasing commit ids, also under concurrent commits.
//!   - Enforced in: [`Runtime::commit`] (master lock held across apply and bump)
//!   - Tested by: [`crate::invariants::test_commit_ids_strictly_increase`]
//!   - Failure symptom: Clients skip a sync and cook stale graphs.
//!
//! - Must not replicate again when nothing was committed since the last sync.
//!   - Enforced in: `RuntimeInner::sync_client`
//!   - Tested by: [`crate::invariants::test_replication_is_idempotent`]
//!   - Failure symptom: Every cook pays for a graph walk and invalidates caches.
//!
//! - Must replicate a shared input once per thread engine.
//!   - Enforced in: [`OpTreeSynchronizer::sync_from_op`]
//!   - Tested by: [`crate::invariants::test_shared_inputs_replicate_once`]
//!   - Failure symptom: Thread engines grow with every client bound to the same graph.
//!
//! - Must keep committed ops immutable.
//!   - Enforced in: `RuntimeInner::validate`
//!   - Tested by: [`crate::invariants::test_committed_ops_are_frozen`]
//!   - Failure symptom: Thread engines keep cooking the old args of a changed op.
//!
//! - Must leave the runtime and the transaction untouched when a commit is rejected.
//!   - Enforced in: `RuntimeInner::validate` (runs before the master engine changes)
//!   - Tested by: [`crate::invariants::test_rejected_commit_changes_nothing`]
//!   - Failure symptom: Half-applied graphs in the master engine.
//!
//! # Lock order
//!
//! Client path: per-key client state, then the key's thread engine, then the client's
//! shared state. Commit path: master engine, then client shared state. The master lock
//! is never taken while a thread engine is held.

mod client;
mod config;
mod error;
mod host;
mod location;
pub mod logging;
mod op;
mod op_id;
mod op_tree;
pub mod optree_util;
mod runtime;
mod synchronizer;
mod thread_bound;
mod transaction;
mod traversal;

pub use client::{BoundClient, Client};
pub use config::{EngineConfig, LoggingConfig, RuntimeConfig, TraversalConfig};
pub use error::{BuilderError, CommitError, ConfigError, GraphError, HostError, ParseOpIdError, RuntimeError, SyncError};
pub use host::{DEFAULT_HOST, HOST_API_VERSION, PluginHost, host, set_host};
pub use kodachi_geolib::{CommitId, GeolibOptions};
pub use location::LocationData;
pub use op::Op;
pub use op_id::{KodachiOpId, OP_ID_STR_LEN};
pub use op_tree::{BuilderOp, OP_ARGS, OP_INPUTS, OP_TYPE, OpTreeBuilder, find_terminal_ops, parse_op_id};
pub use runtime::{Runtime, ThreadStats};
pub use synchronizer::OpTreeSynchronizer;
pub use thread_bound::{ThreadBound, ThreadKey};
pub use transaction::Transaction;
pub use traversal::{PARALLEL_TRAVERSAL_ATTR, Traversal, TraversalState};
pub use {kodachi_attribute, kodachi_geolib};

#[cfg(any(test, doc))]
pub(crate) mod invariants;
