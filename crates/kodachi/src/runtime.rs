use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use kodachi_attribute::GroupAttribute;
use kodachi_geolib::{CommitId, GeolibOptions, GeolibRuntime, NativeClientId, NativeOpId, OpTypeRegistry};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use tracing::{debug, error, trace};

use crate::client::{Client, ThreadLocalClient};
use crate::config::RuntimeConfig;
use crate::error::{CommitError, RuntimeError, SyncError};
use crate::host;
use crate::op::{CommittedOp, Op};
use crate::op_id::KodachiOpId;
use crate::synchronizer::OpTreeSynchronizer;
use crate::thread_bound::{ThreadBound, ThreadKey};
use crate::transaction::Transaction;

/// Private engine of one [`ThreadKey`] plus the map of what has been replicated into it.
pub(crate) struct ThreadEngine {
	/// Changes whenever the engine is rebuilt, so stale native client ids are detected.
	pub(crate) serial: u64,
	pub(crate) engine: GeolibRuntime,
	pub(crate) sync: OpTreeSynchronizer,
	pub(crate) syncs: u64,
}

impl ThreadEngine {
	fn new(serial: u64, registry: Arc<OpTypeRegistry>, options: GeolibOptions) -> Self {
		Self {
			serial,
			engine: GeolibRuntime::with_options(registry, options),
			sync: OpTreeSynchronizer::new(),
			syncs: 0,
		}
	}
}

/// Replication and cache counters of one thread engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStats {
	/// Ops created in the thread engine by replication.
	pub replicated_ops: u64,
	/// Entries in the master-to-thread op map.
	pub op_map_len: usize,
	/// Distinct locations currently cached by the thread engine.
	pub cached_locations: usize,
	/// Client syncs that were not short-circuited by an unchanged commit id.
	pub syncs: u64,
	/// Native clients registered in the thread engine.
	pub clients: usize,
}

pub(crate) struct RuntimeInner {
	master: Mutex<GeolibRuntime>,
	latest_commit_id: AtomicU64,
	ops_by_id: DashMap<KodachiOpId, Op, FxBuildHasher>,
	ops_by_native: DashMap<NativeOpId, Op, FxBuildHasher>,
	engines: ThreadBound<ThreadEngine>,
	registry: Arc<OpTypeRegistry>,
	options: RwLock<GeolibOptions>,
	config: RuntimeConfig,
	next_engine: AtomicU64,
}

/// Thread-safe façade over one master engine and a pool of per-thread engines.
///
/// `Runtime` is a cheap handle; clones share state. [`Op`], [`Client`] and
/// [`Transaction`] only hold weak references back to it.
#[derive(Clone)]
pub struct Runtime {
	inner: Arc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Runtime")
			.field("latest_commit_id", &self.latest_commit_id())
			.field("ops", &self.inner.ops_by_id.len())
			.field("thread_engines", &self.inner.engines.len())
			.finish_non_exhaustive()
	}
}

impl Runtime {
	/// Creates a runtime with default configuration. Requires [`crate::set_host`].
	pub fn create() -> Result<Self, RuntimeError> {
		Self::with_config(RuntimeConfig::default())
	}

	pub fn with_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
		let registry = host::registry().ok_or(RuntimeError::HostNotSet)?;
		let options = config.geolib_options();
		debug!(root = %options.root_location_path, "creating runtime");
		Ok(Self {
			inner: Arc::new(RuntimeInner {
				master: Mutex::new(GeolibRuntime::with_options(Arc::clone(&registry), options.clone())),
				latest_commit_id: AtomicU64::new(0),
				ops_by_id: DashMap::with_hasher(FxBuildHasher),
				ops_by_native: DashMap::with_hasher(FxBuildHasher),
				engines: ThreadBound::new(),
				registry,
				options: RwLock::new(options),
				config,
				next_engine: AtomicU64::new(0),
			}),
		})
	}

	pub(crate) fn from_inner(inner: Arc<RuntimeInner>) -> Self {
		Self { inner }
	}

	pub fn create_transaction(&self) -> Transaction {
		Transaction::new(Arc::downgrade(&self.inner))
	}

	/// Publishes `txn` and returns the new commit id.
	///
	/// The transaction is validated before anything is applied; on error the runtime and
	/// the transaction are left unchanged. On success the transaction is cleared.
	pub fn commit(&self, txn: &mut Transaction) -> Result<CommitId, CommitError> {
		if !std::ptr::eq(txn.runtime.as_ptr(), Arc::as_ptr(&self.inner)) {
			return Err(match txn.runtime.strong_count() {
				0 => CommitError::Expired,
				_ => CommitError::ForeignTransaction,
			});
		}
		if txn.is_empty() {
			return Ok(self.latest_commit_id());
		}

		let commit = {
			let mut master = self.inner.master.lock();
			self.inner.validate(txn)?;
			self.inner.apply(&mut master, txn)?
		};
		txn.clear();
		Ok(commit)
	}

	pub fn latest_commit_id(&self) -> CommitId {
		self.inner.latest_commit_id()
	}

	/// The op registered under `id`, if any commit published it.
	pub fn get_op_from_op_id(&self, id: KodachiOpId) -> Option<Op> {
		self.inner.op_by_id(id)
	}

	/// The op published as `native` in the master engine.
	pub fn get_op_from_native_id(&self, native: NativeOpId) -> Option<Op> {
		self.inner.ops_by_native.get(&native).map(|op| op.value().clone())
	}

	pub fn is_valid_op(&self, id: KodachiOpId) -> bool {
		self.inner.ops_by_id.contains_key(&id)
	}

	/// Number of committed ops.
	pub fn op_count(&self) -> usize {
		self.inner.ops_by_id.len()
	}

	pub fn config(&self) -> &RuntimeConfig {
		&self.inner.config
	}

	pub fn describe_op(&self, op_type: &str) -> Option<GroupAttribute> {
		self.inner.registry.describe(op_type)
	}

	pub fn registered_op_types(&self) -> Vec<String> {
		self.inner.registry.names()
	}

	pub fn root_location_path(&self) -> String {
		self.inner.options.read().root_location_path.clone()
	}

	pub fn options(&self) -> GeolibOptions {
		self.inner.options.read().clone()
	}

	/// Applies `options` to the master engine and every thread engine.
	pub fn set_options(&self, options: GeolibOptions) {
		*self.inner.options.write() = options.clone();
		self.inner.master.lock().set_options(options.clone());
		for (_, engine) in self.inner.engines.slots() {
			engine.lock().engine.set_options(options.clone());
		}
	}

	/// Drops cooked data in the master and every thread engine.
	pub fn flush_caches(&self) {
		self.inner.master.lock().flush_caches();
		for (_, engine) in self.inner.engines.slots() {
			engine.lock().engine.flush_caches();
		}
	}

	/// Discards the thread engine of `key`, including everything replicated into it.
	/// Clients re-sync from scratch the next time they cook on `key`.
	pub fn release_thread(&self, key: ThreadKey) -> bool {
		let released = self.inner.engines.remove(key).is_some();
		if released {
			debug!(thread = %key, "released thread engine");
		}
		released
	}

	/// Keys that currently own a thread engine.
	pub fn thread_keys(&self) -> Vec<ThreadKey> {
		self.inner.engines.keys()
	}

	pub fn thread_stats(&self, key: ThreadKey) -> Option<ThreadStats> {
		let engine = self.inner.engines.get(key)?;
		let engine = engine.lock();
		Some(ThreadStats {
			replicated_ops: engine.sync.replicated(),
			op_map_len: engine.sync.op_map_len(),
			cached_locations: engine.engine.cached_locations().len(),
			syncs: engine.syncs,
			clients: engine.engine.client_count(),
		})
	}

	/// Cached locations of the thread engine of `key`.
	pub fn cached_locations(&self, key: ThreadKey) -> Vec<String> {
		self.inner
			.engines
			.get(key)
			.map(|engine| engine.lock().engine.cached_locations())
			.unwrap_or_default()
	}

	/// Whether `op` has been replicated into the thread engine of `key`.
	pub fn is_replicated(&self, key: ThreadKey, op: &Op) -> bool {
		let (Some(native), Some(engine)) = (op.native_id(), self.inner.engines.get(key)) else {
			return false;
		};
		engine.lock().sync.destination(native).is_some()
	}
}

impl RuntimeInner {
	pub(crate) fn latest_commit_id(&self) -> CommitId {
		CommitId::new(self.latest_commit_id.load(Ordering::SeqCst))
	}

	pub(crate) fn op_by_id(&self, id: KodachiOpId) -> Option<Op> {
		self.ops_by_id.get(&id).map(|op| op.value().clone())
	}

	pub(crate) fn thread_engine(&self, key: ThreadKey) -> Arc<Mutex<ThreadEngine>> {
		self.engines.get_or_insert_with(key, || {
			let serial = self.next_engine.fetch_add(1, Ordering::Relaxed) + 1;
			debug!(thread = %key, serial, "created thread engine");
			ThreadEngine::new(serial, Arc::clone(&self.registry), self.options.read().clone())
		})
	}

	pub(crate) fn existing_thread_engine(&self, key: ThreadKey) -> Option<Arc<Mutex<ThreadEngine>>> {
		self.engines.get(key)
	}

	pub(crate) fn remove_master_client(&self, client: NativeClientId) {
		self.master.lock().remove_client(client);
	}

	fn validate(&self, txn: &Transaction) -> Result<(), CommitError> {
		let this: *const RuntimeInner = self;
		let known = |op: &Op| -> Result<(), CommitError> {
			if !op.belongs_to(this) {
				return Err(CommitError::ForeignOp(op.id()));
			}
			if op.is_committed() {
				return Ok(());
			}
			match txn.new_ops.get(&op.id()) {
				Some(pending) if pending.ptr_eq(op) => Ok(()),
				_ => Err(CommitError::UnknownOp(op.id())),
			}
		};

		for op in txn.new_ops.values() {
			known(op)?;
			if let Some(existing) = self.op_by_id(op.id())
				&& !existing.ptr_eq(op)
			{
				return Err(CommitError::DuplicateOpId(op.id()));
			}
		}
		for (op, _, _) in txn.op_args.values() {
			known(op)?;
			if op.is_committed() {
				return Err(CommitError::OpFrozen(op.id()));
			}
		}
		for (op, inputs) in txn.op_inputs.values() {
			known(op)?;
			if op.is_committed() {
				return Err(CommitError::OpFrozen(op.id()));
			}
			for input in inputs {
				known(input)?;
			}
		}
		for (client, op) in txn.client_ops.values() {
			if !client.belongs_to(this) {
				return Err(CommitError::ForeignClient(client.id()));
			}
			known(op)?;
		}

		match find_cycle(txn) {
			Some(id) => Err(CommitError::Cycle(id)),
			None => Ok(()),
		}
	}

	fn apply(&self, master: &mut GeolibRuntime, txn: &Transaction) -> Result<CommitId, CommitError> {
		let mut gtxn = master.create_transaction();

		let mut natives: FxHashMap<KodachiOpId, NativeOpId> = FxHashMap::default();
		let fresh: Vec<(&Op, NativeOpId)> = txn
			.new_ops
			.values()
			.filter(|op| !op.is_committed())
			.map(|op| {
				let native = gtxn.create_op();
				natives.insert(op.id(), native);
				(op, native)
			})
			.collect();
		let resolve = |op: &Op| op.native_id().or_else(|| natives.get(&op.id()).copied());

		let mut published = Vec::with_capacity(fresh.len());
		for (op, native) in &fresh {
			let (op_type, args) = txn
				.op_args
				.get(&op.id())
				.map(|(_, op_type, args)| (op_type.clone(), args.clone()))
				.unwrap_or_default();
			let inputs: Vec<Op> = txn.op_inputs.get(&op.id()).map(|(_, inputs)| inputs.clone()).unwrap_or_default();

			if op_type.is_empty() && !args.is_valid() {
				trace!(op_id = %op.id(), "committing op without args");
			} else {
				gtxn.set_op_args(*native, op_type.clone(), args.clone());
			}
			let native_inputs: Vec<NativeOpId> = inputs.iter().filter_map(&resolve).collect();
			if !native_inputs.is_empty() {
				gtxn.set_op_inputs(*native, native_inputs);
			}
			published.push(CommittedOp {
				native: *native,
				op_type,
				args,
				inputs,
			});
		}

		let mut bindings = Vec::with_capacity(txn.client_ops.len());
		for (client, op) in txn.client_ops.values() {
			let Some(native_op) = resolve(op) else {
				return Err(CommitError::UnknownOp(op.id()));
			};
			let master_client = match client.master_client() {
				Some(existing) => existing,
				None => gtxn.create_client(),
			};
			gtxn.set_client_op(master_client, native_op);
			bindings.push((client, op, master_client));
		}

		master.commit(gtxn).inspect_err(|e| error!(error = %e, "master engine rejected a validated commit"))?;

		for ((op, native), state) in fresh.iter().zip(published) {
			op.publish(state);
			self.ops_by_id.entry(op.id()).or_insert_with(|| (*op).clone());
			self.ops_by_native.entry(*native).or_insert_with(|| (*op).clone());
		}
		for (client, op, master_client) in bindings {
			client.bind(op.clone(), master_client);
		}

		let commit = CommitId::new(self.latest_commit_id.fetch_add(1, Ordering::SeqCst) + 1);
		debug!(commit = commit.get(), new_ops = fresh.len(), clients = txn.client_ops.len(), "commit");
		Ok(commit)
	}

	/// Brings `local`'s native client on `engine` up to date with the client's terminal op.
	pub(crate) fn sync_client(
		&self,
		client: &Client,
		local: &mut ThreadLocalClient,
		engine: &mut ThreadEngine,
	) -> Result<NativeClientId, RuntimeError> {
		local.adopt_engine(engine.serial);

		let (op, commit) = client.terminal_op_at(self);
		let op = op.ok_or(RuntimeError::ClientOpNotSet)?;
		if let Some(native) = local.client
			&& local.last_synced == Some(commit)
		{
			return Ok(native);
		}

		let mut txn = engine.engine.create_transaction();
		let native = match local.client {
			Some(native) => native,
			None => txn.create_client(),
		};
		let dest = match engine.sync.sync_from_op(&mut txn, &op) {
			Ok(dest) => dest,
			Err(e) => {
				self.rebuild_engine(local, engine, &e);
				return Err(e.into());
			}
		};
		if engine.engine.client_op(native) != Some(dest) {
			txn.set_client_op(native, dest);
		}
		if !txn.is_empty()
			&& let Err(e) = engine.engine.commit(txn)
		{
			let e = SyncError::Engine(e);
			self.rebuild_engine(local, engine, &e);
			return Err(e.into());
		}

		local.client = Some(native);
		local.last_synced = Some(commit);
		engine.syncs += 1;
		trace!(thread = %local.thread, commit = commit.get(), op_id = %op.id(), "synced client");
		Ok(native)
	}

	/// Replaces a thread engine whose op map may no longer match its contents.
	fn rebuild_engine(&self, local: &mut ThreadLocalClient, engine: &mut ThreadEngine, cause: &SyncError) {
		error!(thread = %local.thread, error = %cause, "replication failed; rebuilding thread engine");
		let serial = self.next_engine.fetch_add(1, Ordering::Relaxed) + 1;
		*engine = ThreadEngine::new(serial, Arc::clone(&self.registry), self.options.read().clone());
		local.adopt_engine(serial);
	}
}

/// First op found on a cycle among the inputs staged on `txn`.
///
/// Committed ops are leaves here: their inputs are already fixed and acyclic.
fn find_cycle(txn: &Transaction) -> Option<KodachiOpId> {
	let mut done: FxHashSet<KodachiOpId> = FxHashSet::default();
	for start in txn.op_inputs.keys() {
		if done.contains(start) {
			continue;
		}
		let mut on_path: FxHashSet<KodachiOpId> = FxHashSet::default();
		let mut stack: Vec<(KodachiOpId, usize)> = vec![(*start, 0)];
		on_path.insert(*start);
		while let Some((id, next)) = stack.last_mut() {
			let inputs = staged_inputs(txn, *id);
			if let Some(input) = inputs.get(*next) {
				*next += 1;
				let input = input.id();
				if on_path.contains(&input) {
					return Some(input);
				}
				if !done.contains(&input) {
					on_path.insert(input);
					stack.push((input, 0));
				}
			} else {
				on_path.remove(id);
				done.insert(*id);
				stack.pop();
			}
		}
	}
	None
}

fn staged_inputs(txn: &Transaction, id: KodachiOpId) -> &[Op] {
	txn.op_inputs.get(&id).map(|(_, inputs)| inputs.as_slice()).unwrap_or(&[])
}
