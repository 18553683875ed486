//! Parallel expansion of the scene graph below a root location.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::client::Client;
use crate::error::RuntimeError;
use crate::location::LocationData;
use crate::op::Op;
use crate::runtime::Runtime;
use crate::thread_bound::ThreadKey;

/// Int attribute that, when `0`, keeps a location's children on the thread that cooked it.
pub const PARALLEL_TRAVERSAL_ATTR: &str = "kodachi.parallelTraversal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
	Initializing,
	Running,
	Complete,
}

struct WorkQueue {
	pending: VecDeque<String>,
	in_flight: usize,
	failed: Option<RuntimeError>,
}

/// Cooks every existing location below a root and holds the results until retrieved.
///
/// Worker threads share one [`Client`], so each of them cooks on its own thread engine.
/// The engines of the workers are released when they finish.
pub struct Traversal {
	client: Client,
	root: String,
	threads: usize,
	evict: bool,
	state: Mutex<TraversalState>,
	data: Mutex<VecDeque<LocationData>>,
}

impl std::fmt::Debug for Traversal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Traversal")
			.field("root", &self.root)
			.field("threads", &self.threads)
			.field("evict", &self.evict)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

impl Traversal {
	/// Traversal of `client`'s graph, configured from its runtime.
	pub fn new(client: Client) -> Self {
		let (root, threads, evict) = match client.runtime() {
			Ok(runtime) => {
				let traversal = &runtime.config().traversal;
				(runtime.root_location_path(), traversal.worker_threads(), traversal.evict)
			}
			Err(_) => ("/root".to_owned(), 1, true),
		};
		Self {
			client,
			root,
			threads,
			evict,
			state: Mutex::new(TraversalState::Initializing),
			data: Mutex::new(VecDeque::new()),
		}
	}

	/// Binds a new client to `op` and traverses it.
	pub fn from_op(runtime: &Runtime, op: &Op) -> Result<Self, RuntimeError> {
		let mut txn = runtime.create_transaction();
		let client = txn.create_client();
		txn.set_client_op(&client, op);
		runtime.commit(&mut txn)?;
		Ok(Self::new(client))
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn set_root_location_path(&mut self, path: impl Into<String>) {
		self.root = path.into();
	}

	pub fn root_location_path(&self) -> &str {
		&self.root
	}

	pub fn set_threads(&mut self, threads: usize) {
		self.threads = threads.max(1);
	}

	pub fn threads(&self) -> usize {
		self.threads
	}

	pub fn set_evict(&mut self, evict: bool) {
		self.evict = evict;
	}

	pub fn state(&self) -> TraversalState {
		*self.state.lock()
	}

	/// Expands the scene graph and blocks until done. Returns the number of existing
	/// locations cooked; the first cook error stops the traversal.
	pub fn run(&self) -> Result<usize, RuntimeError> {
		*self.state.lock() = TraversalState::Running;
		debug!(root = %self.root, threads = self.threads, "traversal started");

		let queue = Mutex::new(WorkQueue {
			pending: VecDeque::from([self.root.clone()]),
			in_flight: 0,
			failed: None,
		});
		let ready = Condvar::new();
		let cooked = AtomicUsize::new(0);
		std::thread::scope(|s| {
			for _ in 0..self.threads {
				s.spawn(|| self.work(&queue, &ready, &cooked));
			}
		});

		*self.state.lock() = TraversalState::Complete;
		let cooked = cooked.into_inner();
		debug!(root = %self.root, cooked, "traversal complete");
		match queue.into_inner().failed {
			Some(e) => Err(e),
			None => Ok(cooked),
		}
	}

	fn work(&self, queue: &Mutex<WorkQueue>, ready: &Condvar, cooked: &AtomicUsize) {
		let key = ThreadKey::current();
		loop {
			let next = {
				let mut q = queue.lock();
				loop {
					if q.failed.is_some() {
						break None;
					}
					if let Some(path) = q.pending.pop_front() {
						q.in_flight += 1;
						break Some(path);
					}
					if q.in_flight == 0 {
						break None;
					}
					ready.wait(&mut q);
				}
			};
			let Some(path) = next else {
				break;
			};

			let result = self.expand(path, queue, ready, cooked);
			let mut q = queue.lock();
			q.in_flight -= 1;
			if let Err(e) = result
				&& q.failed.is_none()
			{
				q.failed = Some(e);
			}
			drop(q);
			ready.notify_all();
		}

		ready.notify_all();
		self.client.forget_thread(key);
		if let Ok(runtime) = self.client.runtime() {
			runtime.release_thread(key);
		}
	}

	/// Cooks `path` and, for serial locations, its descendants on this thread.
	fn expand(&self, path: String, queue: &Mutex<WorkQueue>, ready: &Condvar, cooked: &AtomicUsize) -> Result<(), RuntimeError> {
		let mut local = vec![path];
		while let Some(path) = local.pop() {
			let data = self.client.cook_location(&path, self.evict)?;
			if !data.does_location_exist() {
				continue;
			}
			cooked.fetch_add(1, Ordering::Relaxed);

			let serial = data.attr(PARALLEL_TRAVERSAL_ATTR).int_value() == Some(0);
			let children: Vec<String> = data.child_paths().collect();
			trace!(path = %path, children = children.len(), serial, "cooked location");
			self.data.lock().push_back(data);

			if serial {
				local.extend(children.into_iter().rev());
			} else if !children.is_empty() {
				queue.lock().pending.extend(children);
				ready.notify_all();
			}
		}
		Ok(())
	}

	/// Pops the oldest stored location.
	pub fn get_location(&self) -> Option<LocationData> {
		self.data.lock().pop_front()
	}

	/// Every stored location, oldest first.
	pub fn get_locations(&self) -> Vec<LocationData> {
		self.data.lock().drain(..).collect()
	}

	/// False once the traversal is complete and everything has been retrieved.
	pub fn is_valid(&self) -> bool {
		self.state() != TraversalState::Complete || !self.data.lock().is_empty()
	}
}
