use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use kodachi_geolib::{CommitId, GeolibError, GeolibRuntime, NativeClientId};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::RuntimeError;
use crate::location::LocationData;
use crate::op::Op;
use crate::runtime::{Runtime, RuntimeInner};
use crate::thread_bound::{ThreadBound, ThreadKey};

static NEXT_CLIENT: AtomicU64 = AtomicU64::new(1);

/// Per-key state of one client: its native client in that key's thread engine.
#[derive(Debug)]
pub(crate) struct ThreadLocalClient {
	pub(crate) client: Option<NativeClientId>,
	pub(crate) last_synced: Option<CommitId>,
	pub(crate) thread: ThreadKey,
	engine_serial: u64,
}

impl ThreadLocalClient {
	fn new(thread: ThreadKey) -> Self {
		Self {
			client: None,
			last_synced: None,
			thread,
			engine_serial: 0,
		}
	}

	/// Forgets the native client if it belongs to an engine that has since been replaced.
	pub(crate) fn adopt_engine(&mut self, serial: u64) {
		if self.engine_serial != serial {
			self.client = None;
			self.last_synced = None;
			self.engine_serial = serial;
		}
	}
}

#[derive(Debug, Default)]
struct ClientState {
	op: Option<Op>,
	master: Option<NativeClientId>,
}

struct ClientInner {
	id: u64,
	runtime: Weak<RuntimeInner>,
	state: Mutex<ClientState>,
	locals: ThreadBound<ThreadLocalClient>,
}

impl Drop for ClientInner {
	fn drop(&mut self) {
		let Some(runtime) = self.runtime.upgrade() else {
			return;
		};
		for (key, local) in self.locals.drain() {
			let local = local.lock();
			let (Some(native), Some(engine)) = (local.client, runtime.existing_thread_engine(key)) else {
				continue;
			};
			let mut engine = engine.lock();
			if engine.serial == local.engine_serial {
				engine.engine.remove_client(native);
			}
		}
		if let Some(master) = self.state.get_mut().master {
			runtime.remove_master_client(master);
		}
		trace!(client = self.id, "client released");
	}
}

/// A cooking session bound to a terminal op, usable from any number of threads.
///
/// Each calling thread cooks on its own private engine; the terminal op set by the
/// last commit is shared by all of them.
#[derive(Clone)]
pub struct Client(Arc<ClientInner>);

impl fmt::Debug for Client {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Client")
			.field("id", &self.0.id)
			.field("op", &self.get_op().map(|op| op.id()))
			.field("threads", &self.0.locals.len())
			.finish()
	}
}

impl PartialEq for Client {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for Client {}

impl Client {
	pub(crate) fn new(runtime: Weak<RuntimeInner>) -> Self {
		Self(Arc::new(ClientInner {
			id: NEXT_CLIENT.fetch_add(1, Ordering::Relaxed),
			runtime,
			state: Mutex::new(ClientState::default()),
			locals: ThreadBound::new(),
		}))
	}

	/// Process-unique client number.
	pub fn id(&self) -> u64 {
		self.0.id
	}

	/// Terminal op set by the last commit that bound this client.
	pub fn get_op(&self) -> Option<Op> {
		self.0.state.lock().op.clone()
	}

	pub fn runtime(&self) -> Result<Runtime, RuntimeError> {
		self.0.runtime.upgrade().map(Runtime::from_inner).ok_or(RuntimeError::Expired)
	}

	/// This client as seen from `key`'s thread engine.
	pub fn on(&self, key: ThreadKey) -> BoundClient {
		BoundClient {
			client: self.clone(),
			key,
		}
	}

	/// Cooks `path` on the calling thread's engine. With `evict`, that engine keeps only
	/// this location's cooked data afterwards.
	pub fn cook_location(&self, path: &str, evict: bool) -> Result<LocationData, RuntimeError> {
		self.on(ThreadKey::current()).cook_location(path, evict)
	}

	pub fn set_locations_active<S: AsRef<str>>(&self, paths: &[S]) -> Result<(), RuntimeError> {
		self.on(ThreadKey::current()).set_locations_active(paths)
	}

	pub fn get_location_events(&self) -> Result<Vec<LocationData>, RuntimeError> {
		self.on(ThreadKey::current()).get_location_events()
	}

	/// Keys this client has cooked on.
	pub fn thread_keys(&self) -> Vec<ThreadKey> {
		self.0.locals.keys()
	}

	/// Drops the per-key state for `key` without touching the thread engine.
	pub(crate) fn forget_thread(&self, key: ThreadKey) {
		self.0.locals.remove(key);
	}

	pub(crate) fn belongs_to(&self, runtime: *const RuntimeInner) -> bool {
		std::ptr::eq(self.0.runtime.as_ptr(), runtime)
	}

	pub(crate) fn master_client(&self) -> Option<NativeClientId> {
		self.0.state.lock().master
	}

	pub(crate) fn bind(&self, op: Op, master: NativeClientId) {
		let mut state = self.0.state.lock();
		state.op = Some(op);
		state.master = Some(master);
	}

	/// Terminal op and the runtime's commit id, read together under the client lock.
	///
	/// Commits bind clients before advancing the commit id, so the pair never pairs an
	/// older op with a newer id.
	pub(crate) fn terminal_op_at(&self, runtime: &RuntimeInner) -> (Option<Op>, CommitId) {
		let state = self.0.state.lock();
		(state.op.clone(), runtime.latest_commit_id())
	}
}

/// A [`Client`] pinned to one [`ThreadKey`].
#[derive(Debug, Clone)]
pub struct BoundClient {
	client: Client,
	key: ThreadKey,
}

impl BoundClient {
	pub fn key(&self) -> ThreadKey {
		self.key
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Replicates the client's terminal op into this key's engine if a commit happened
	/// since the last sync.
	pub fn sync(&self) -> Result<(), RuntimeError> {
		self.with_engine(|_, _| Ok(()))
	}

	/// Commit id this key last synced to.
	pub fn last_synced(&self) -> Option<CommitId> {
		let local = self.client.0.locals.get(self.key)?;
		local.lock().last_synced
	}

	pub fn cook_location(&self, path: &str, evict: bool) -> Result<LocationData, RuntimeError> {
		self.with_engine(|engine, client| {
			let data = engine.cook_location(client, path)?;
			if evict {
				engine.evict(path);
			}
			Ok(LocationData::new(path, data))
		})
	}

	/// Marks `paths` as active; later calls add to the set.
	pub fn set_locations_active<S: AsRef<str>>(&self, paths: &[S]) -> Result<(), RuntimeError> {
		let paths: Vec<String> = paths.iter().map(|p| p.as_ref().to_owned()).collect();
		self.with_engine(|engine, client| engine.set_locations_active(client, &paths))
	}

	/// Active locations whose cooked data changed since they were last reported.
	pub fn get_location_events(&self) -> Result<Vec<LocationData>, RuntimeError> {
		self.with_engine(|engine, client| {
			let events = engine.get_location_events(client, usize::MAX)?;
			Ok(events.into_iter().map(|e| LocationData::new(e.path, e.data)).collect())
		})
	}

	fn with_engine<R>(&self, f: impl FnOnce(&mut GeolibRuntime, NativeClientId) -> Result<R, GeolibError>) -> Result<R, RuntimeError> {
		let runtime = self.client.0.runtime.upgrade().ok_or(RuntimeError::Expired)?;
		let local = self.client.0.locals.get_or_insert_with(self.key, || ThreadLocalClient::new(self.key));
		let mut local = local.lock();
		let engine = runtime.thread_engine(self.key);
		let mut engine = engine.lock();

		let native = runtime.sync_client(&self.client, &mut local, &mut engine)?;
		Ok(f(&mut engine.engine, native)?)
	}
}
