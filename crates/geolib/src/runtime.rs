use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kodachi_attribute::{Attribute, GroupAttribute, Hash};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::error::GeolibError;
use crate::ids::{CommitId, NativeClientId, NativeOpId};
use crate::location::{LocationData, LocationEvent};
use crate::op_type::{CookContext, OpTypeRegistry};
use crate::ops;

static NEXT_ENGINE: AtomicU64 = AtomicU64::new(1);

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeolibOptions {
	/// The location that exists in the implicit (empty) scene.
	pub root_location_path: String,
}

impl Default for GeolibOptions {
	fn default() -> Self {
		Self {
			root_location_path: "/root".to_owned(),
		}
	}
}

/// Cook counters, mostly for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookStats {
	/// Op evaluations that missed the cache.
	pub cooks: u64,
	/// `cook_location` calls answered entirely from the cache.
	pub cache_hits: u64,
}

#[derive(Debug, Default)]
struct IdSource {
	next_op: AtomicU64,
	next_client: AtomicU64,
}

impl IdSource {
	fn op(&self) -> NativeOpId {
		NativeOpId(self.next_op.fetch_add(1, Ordering::Relaxed) + 1)
	}

	fn client(&self) -> NativeClientId {
		NativeClientId(self.next_client.fetch_add(1, Ordering::Relaxed) + 1)
	}
}

#[derive(Debug, Clone, Default)]
struct OpNode {
	op_type: String,
	args: Attribute,
	inputs: Vec<NativeOpId>,
}

#[derive(Debug, Default)]
struct ClientState {
	op: Option<NativeOpId>,
	/// Active location -> hash of the last event emitted for it.
	active: BTreeMap<String, Option<Hash>>,
}

/// Staged edits for one [`GeolibRuntime`].
///
/// Ids handed out by `create_op` / `create_client` are reserved immediately but only
/// become known to the engine when the transaction is committed. Later writes to the
/// same op or client win.
#[derive(Debug)]
pub struct GeolibTransaction {
	engine: u64,
	ids: Arc<IdSource>,
	new_ops: Vec<NativeOpId>,
	op_args: Vec<(NativeOpId, String, Attribute)>,
	op_inputs: Vec<(NativeOpId, Vec<NativeOpId>)>,
	new_clients: Vec<NativeClientId>,
	client_ops: Vec<(NativeClientId, NativeOpId)>,
}

impl GeolibTransaction {
	pub fn create_op(&mut self) -> NativeOpId {
		let id = self.ids.op();
		self.new_ops.push(id);
		id
	}

	pub fn set_op_args(&mut self, op: NativeOpId, op_type: impl Into<String>, args: Attribute) {
		self.op_args.push((op, op_type.into(), args));
	}

	pub fn set_op_inputs(&mut self, op: NativeOpId, inputs: Vec<NativeOpId>) {
		self.op_inputs.push((op, inputs));
	}

	pub fn create_client(&mut self) -> NativeClientId {
		let id = self.ids.client();
		self.new_clients.push(id);
		id
	}

	pub fn set_client_op(&mut self, client: NativeClientId, op: NativeOpId) {
		self.client_ops.push((client, op));
	}

	pub fn is_empty(&self) -> bool {
		self.new_ops.is_empty()
			&& self.op_args.is_empty()
			&& self.op_inputs.is_empty()
			&& self.new_clients.is_empty()
			&& self.client_ops.is_empty()
	}
}

/// One single-threaded operator-graph engine instance.
pub struct GeolibRuntime {
	engine: u64,
	ids: Arc<IdSource>,
	ops: FxHashMap<NativeOpId, OpNode>,
	clients: FxHashMap<NativeClientId, ClientState>,
	/// path -> op -> cooked data
	cache: FxHashMap<String, FxHashMap<NativeOpId, LocationData>>,
	commit_id: CommitId,
	registry: Arc<OpTypeRegistry>,
	options: GeolibOptions,
	stats: CookStats,
}

impl std::fmt::Debug for GeolibRuntime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GeolibRuntime")
			.field("engine", &self.engine)
			.field("ops", &self.ops.len())
			.field("clients", &self.clients.len())
			.field("commit_id", &self.commit_id)
			.finish_non_exhaustive()
	}
}

impl GeolibRuntime {
	pub fn new(registry: Arc<OpTypeRegistry>) -> Self {
		Self::with_options(registry, GeolibOptions::default())
	}

	pub fn with_options(registry: Arc<OpTypeRegistry>, options: GeolibOptions) -> Self {
		Self {
			engine: NEXT_ENGINE.fetch_add(1, Ordering::Relaxed),
			ids: Arc::default(),
			ops: FxHashMap::default(),
			clients: FxHashMap::default(),
			cache: FxHashMap::default(),
			commit_id: CommitId::ZERO,
			registry,
			options,
			stats: CookStats::default(),
		}
	}

	pub fn create_transaction(&self) -> GeolibTransaction {
		GeolibTransaction {
			engine: self.engine,
			ids: Arc::clone(&self.ids),
			new_ops: Vec::new(),
			op_args: Vec::new(),
			op_inputs: Vec::new(),
			new_clients: Vec::new(),
			client_ops: Vec::new(),
		}
	}

	/// Validates and applies `txn`. Nothing is applied when validation fails.
	pub fn commit(&mut self, txn: GeolibTransaction) -> Result<CommitId, GeolibError> {
		if txn.engine != self.engine {
			return Err(GeolibError::ForeignTransaction {
				expected: self.engine,
				found: txn.engine,
			});
		}
		self.validate(&txn)?;

		let mut touched_existing = false;
		for id in &txn.new_ops {
			self.ops.insert(*id, OpNode::default());
		}
		let new_ops: FxHashSet<NativeOpId> = txn.new_ops.iter().copied().collect();
		for (op, op_type, args) in txn.op_args {
			touched_existing |= !new_ops.contains(&op);
			if let Some(node) = self.ops.get_mut(&op) {
				node.op_type = op_type;
				node.args = args;
			}
		}
		for (op, inputs) in txn.op_inputs {
			touched_existing |= !new_ops.contains(&op);
			if let Some(node) = self.ops.get_mut(&op) {
				node.inputs = inputs;
			}
		}
		for id in txn.new_clients {
			self.clients.insert(id, ClientState::default());
		}
		for (client, op) in txn.client_ops {
			if let Some(state) = self.clients.get_mut(&client) {
				state.op = Some(op);
			}
		}

		if touched_existing {
			self.cache.clear();
		}
		self.commit_id = self.commit_id.next();
		trace!(engine = self.engine, commit = self.commit_id.get(), touched_existing, "geolib commit");
		Ok(self.commit_id)
	}

	fn validate(&self, txn: &GeolibTransaction) -> Result<(), GeolibError> {
		let new_ops: FxHashSet<NativeOpId> = txn.new_ops.iter().copied().collect();
		let known = |op: &NativeOpId| self.ops.contains_key(op) || new_ops.contains(op);

		for (op, _, _) in &txn.op_args {
			if !known(op) {
				return Err(GeolibError::UnknownOp(*op));
			}
		}
		for (op, inputs) in &txn.op_inputs {
			if let Some(bad) = std::iter::once(op).chain(inputs.iter()).find(|id| !known(*id)) {
				return Err(GeolibError::UnknownOp(*bad));
			}
		}
		for (client, op) in &txn.client_ops {
			if !self.clients.contains_key(client) && !txn.new_clients.contains(client) {
				return Err(GeolibError::UnknownClient(*client));
			}
			if !known(op) {
				return Err(GeolibError::UnknownOp(*op));
			}
		}

		let mut overrides: FxHashMap<NativeOpId, &[NativeOpId]> = FxHashMap::default();
		for (op, inputs) in &txn.op_inputs {
			overrides.insert(*op, inputs);
		}
		match self.find_cycle(&overrides) {
			Some(op) => Err(GeolibError::Cycle(op)),
			None => Ok(()),
		}
	}

	/// Depth-first search from every op whose inputs change.
	fn find_cycle(&self, overrides: &FxHashMap<NativeOpId, &[NativeOpId]>) -> Option<NativeOpId> {
		let mut done: FxHashSet<NativeOpId> = FxHashSet::default();
		for start in overrides.keys() {
			if done.contains(start) {
				continue;
			}
			let mut on_path: FxHashSet<NativeOpId> = FxHashSet::default();
			let mut stack: Vec<(NativeOpId, usize)> = vec![(*start, 0)];
			on_path.insert(*start);
			while let Some((op, next)) = stack.last_mut() {
				let inputs = self.inputs_with(overrides, *op);
				if *next < inputs.len() {
					let input = inputs[*next];
					*next += 1;
					if on_path.contains(&input) {
						return Some(input);
					}
					if !done.contains(&input) {
						on_path.insert(input);
						stack.push((input, 0));
					}
				} else {
					on_path.remove(op);
					done.insert(*op);
					stack.pop();
				}
			}
		}
		None
	}

	fn inputs_with<'a>(&'a self, overrides: &'a FxHashMap<NativeOpId, &[NativeOpId]>, op: NativeOpId) -> &'a [NativeOpId] {
		match overrides.get(&op) {
			Some(inputs) => *inputs,
			None => self.ops.get(&op).map(|n| n.inputs.as_slice()).unwrap_or(&[]),
		}
	}

	/// Cooks `path` against the client's terminal op.
	pub fn cook_location(&mut self, client: NativeClientId, path: &str) -> Result<LocationData, GeolibError> {
		let state = self.clients.get(&client).ok_or(GeolibError::UnknownClient(client))?;
		let op = state.op.ok_or(GeolibError::NoClientOp(client))?;
		self.cook(op, path)
	}

	/// Cooks `path` against an arbitrary op.
	pub fn cook(&mut self, root_op: NativeOpId, path: &str) -> Result<LocationData, GeolibError> {
		if let Some(hit) = self.cached(root_op, path) {
			self.stats.cache_hits += 1;
			return Ok(hit);
		}

		let implicit = self.implicit_location(path);
		let mut stack: Vec<(NativeOpId, bool)> = vec![(root_op, false)];
		while let Some((op, expanded)) = stack.pop() {
			if self.is_cached(op, path) {
				continue;
			}
			let node = self.ops.get(&op).ok_or(GeolibError::UnknownOp(op))?;
			if !expanded {
				stack.push((op, true));
				for input in node.inputs.iter().rev() {
					if !self.is_cached(*input, path) {
						stack.push((*input, false));
					}
				}
				continue;
			}

			let mut inputs = Vec::with_capacity(node.inputs.len());
			for input in &node.inputs {
				inputs.push(self.cached(*input, path).ok_or(GeolibError::UnknownOp(*input))?);
			}
			let ctx = CookContext {
				path,
				root: &self.options.root_location_path,
				args: &node.args,
				inputs: &inputs,
				implicit: &implicit,
			};
			let data = match self.registry.get(&node.op_type) {
				Some(op_type) => op_type.cook(&ctx),
				None if node.op_type.is_empty() => ops::error_location(ctx.primary(), &format!("op {op} has no type")),
				None => ops::error_location(ctx.primary(), &format!("unknown op type '{}'", node.op_type)),
			};
			self.stats.cooks += 1;
			self.cache.entry(path.to_owned()).or_default().insert(op, data);
		}

		self.cached(root_op, path).ok_or(GeolibError::UnknownOp(root_op))
	}

	fn implicit_location(&self, path: &str) -> LocationData {
		if path == self.options.root_location_path {
			LocationData::new(GroupAttribute::default(), Vec::new())
		} else {
			LocationData::missing()
		}
	}

	fn cached(&self, op: NativeOpId, path: &str) -> Option<LocationData> {
		self.cache.get(path)?.get(&op).cloned()
	}

	fn is_cached(&self, op: NativeOpId, path: &str) -> bool {
		self.cache.get(path).is_some_and(|ops| ops.contains_key(&op))
	}

	/// Drops every cached location except `keep_path`.
	pub fn evict(&mut self, keep_path: &str) {
		self.cache.retain(|path, _| path == keep_path);
	}

	pub fn flush_caches(&mut self) {
		self.cache.clear();
	}

	/// Distinct cached paths, sorted.
	pub fn cached_locations(&self) -> Vec<String> {
		let mut paths: Vec<_> = self.cache.keys().cloned().collect();
		paths.sort();
		paths
	}

	/// Marks locations as active for `client`; activity is additive.
	pub fn set_locations_active(&mut self, client: NativeClientId, paths: &[String]) -> Result<(), GeolibError> {
		let state = self.clients.get_mut(&client).ok_or(GeolibError::UnknownClient(client))?;
		for path in paths {
			state.active.entry(path.clone()).or_insert(None);
		}
		Ok(())
	}

	/// Cooks every active location and reports those whose data changed since the
	/// last event for them, up to `max` events.
	pub fn get_location_events(&mut self, client: NativeClientId, max: usize) -> Result<Vec<LocationEvent>, GeolibError> {
		let state = self.clients.get(&client).ok_or(GeolibError::UnknownClient(client))?;
		let Some(op) = state.op else {
			return Ok(Vec::new());
		};
		let active: Vec<(String, Option<Hash>)> = state.active.iter().map(|(p, h)| (p.clone(), *h)).collect();

		let mut events = Vec::new();
		for (path, last) in active {
			if events.len() >= max {
				break;
			}
			let data = self.cook(op, &path)?;
			if last == Some(data.hash()) {
				continue;
			}
			if let Some(state) = self.clients.get_mut(&client) {
				state.active.insert(path.clone(), Some(data.hash()));
			}
			events.push(LocationEvent { path, data });
		}
		Ok(events)
	}

	/// Forgets a client. Returns false if it was unknown.
	pub fn remove_client(&mut self, client: NativeClientId) -> bool {
		self.clients.remove(&client).is_some()
	}

	pub fn client_op(&self, client: NativeClientId) -> Option<NativeOpId> {
		self.clients.get(&client).and_then(|s| s.op)
	}

	pub fn has_client(&self, client: NativeClientId) -> bool {
		self.clients.contains_key(&client)
	}

	pub fn op_args(&self, op: NativeOpId) -> Option<(&str, &Attribute)> {
		self.ops.get(&op).map(|n| (n.op_type.as_str(), &n.args))
	}

	pub fn op_inputs(&self, op: NativeOpId) -> Option<&[NativeOpId]> {
		self.ops.get(&op).map(|n| n.inputs.as_slice())
	}

	pub fn op_count(&self) -> usize {
		self.ops.len()
	}

	pub fn client_count(&self) -> usize {
		self.clients.len()
	}

	pub fn latest_commit_id(&self) -> CommitId {
		self.commit_id
	}

	pub fn registry(&self) -> &Arc<OpTypeRegistry> {
		&self.registry
	}

	pub fn describe_op(&self, op_type: &str) -> Option<GroupAttribute> {
		self.registry.describe(op_type)
	}

	pub fn registered_op_types(&self) -> Vec<String> {
		self.registry.names()
	}

	pub fn options(&self) -> &GeolibOptions {
		&self.options
	}

	/// Replaces the options. Cached results are dropped since the implicit scene may change.
	pub fn set_options(&mut self, options: GeolibOptions) {
		if options != self.options {
			self.cache.clear();
		}
		self.options = options;
	}

	pub fn root_location_path(&self) -> &str {
		&self.options.root_location_path
	}

	pub fn stats(&self) -> CookStats {
		self.stats
	}
}
