//! Explicit per-thread resource pools.
//!
//! Engines are not thread-safe, so every caller thread gets its own. Instead of
//! language-level thread-locals the pool is a plain map keyed by [`ThreadKey`], which
//! lets tests stand in for threads with [`ThreadKey::virtual_thread`] handles.

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;

/// Identity of a caller that owns a private engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadKey {
	Os(ThreadId),
	Virtual(u64),
}

impl ThreadKey {
	/// The calling OS thread.
	pub fn current() -> Self {
		Self::Os(std::thread::current().id())
	}

	/// A simulated thread, independent of the OS thread that uses it.
	pub const fn virtual_thread(index: u64) -> Self {
		Self::Virtual(index)
	}
}

impl fmt::Display for ThreadKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Os(id) => write!(f, "{id:?}"),
			Self::Virtual(index) => write!(f, "virtual#{index}"),
		}
	}
}

/// One lazily created, individually locked `T` per [`ThreadKey`].
///
/// The map's shard lock is held only to find or create a slot; work on the resource
/// holds the slot's own lock.
pub struct ThreadBound<T> {
	slots: DashMap<ThreadKey, Arc<Mutex<T>>, FxBuildHasher>,
}

impl<T> Default for ThreadBound<T> {
	fn default() -> Self {
		Self {
			slots: DashMap::with_hasher(FxBuildHasher),
		}
	}
}

impl<T> fmt::Debug for ThreadBound<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ThreadBound").field("keys", &self.keys()).finish()
	}
}

impl<T> ThreadBound<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Slot for `key`, created with `init` on first access.
	///
	/// `init` runs under the shard lock and must not touch this pool.
	pub fn get_or_insert_with(&self, key: ThreadKey, init: impl FnOnce() -> T) -> Arc<Mutex<T>> {
		Arc::clone(self.slots.entry(key).or_insert_with(|| Arc::new(Mutex::new(init()))).value())
	}

	pub fn get(&self, key: ThreadKey) -> Option<Arc<Mutex<T>>> {
		self.slots.get(&key).map(|slot| Arc::clone(slot.value()))
	}

	pub fn remove(&self, key: ThreadKey) -> Option<Arc<Mutex<T>>> {
		self.slots.remove(&key).map(|(_, slot)| slot)
	}

	pub fn contains(&self, key: ThreadKey) -> bool {
		self.slots.contains_key(&key)
	}

	pub fn keys(&self) -> Vec<ThreadKey> {
		self.slots.iter().map(|slot| *slot.key()).collect()
	}

	/// Snapshot of every slot. Slots are locked one at a time by the caller.
	pub fn slots(&self) -> Vec<(ThreadKey, Arc<Mutex<T>>)> {
		self.slots.iter().map(|slot| (*slot.key(), Arc::clone(slot.value()))).collect()
	}

	/// Removes and returns every slot.
	pub fn drain(&mut self) -> Vec<(ThreadKey, Arc<Mutex<T>>)> {
		std::mem::take(&mut self.slots).into_iter().collect()
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slots_are_created_once_per_key() {
		let pool: ThreadBound<Vec<u32>> = ThreadBound::new();
		let a = ThreadKey::virtual_thread(1);
		let b = ThreadKey::virtual_thread(2);

		pool.get_or_insert_with(a, Vec::new).lock().push(1);
		pool.get_or_insert_with(a, || vec![99]).lock().push(2);
		pool.get_or_insert_with(b, Vec::new).lock().push(3);

		assert_eq!(*pool.get(a).unwrap().lock(), vec![1, 2]);
		assert_eq!(*pool.get(b).unwrap().lock(), vec![3]);
		assert_eq!(pool.len(), 2);
	}

	#[test]
	fn os_threads_get_distinct_keys() {
		let here = ThreadKey::current();
		let there = std::thread::spawn(ThreadKey::current).join().unwrap();
		assert_ne!(here, there);
		assert_eq!(here, ThreadKey::current());
		assert_ne!(here, ThreadKey::virtual_thread(0));
	}

	#[test]
	fn remove_and_drain() {
		let mut pool: ThreadBound<u8> = ThreadBound::new();
		for i in 0..3 {
			pool.get_or_insert_with(ThreadKey::virtual_thread(i), || 0);
		}
		assert!(pool.remove(ThreadKey::virtual_thread(0)).is_some());
		assert!(!pool.contains(ThreadKey::virtual_thread(0)));
		assert_eq!(pool.drain().len(), 2);
		assert!(pool.is_empty());
	}

	#[test]
	fn concurrent_first_access_creates_one_slot() {
		let pool = &ThreadBound::<u32>::new();
		let key = ThreadKey::virtual_thread(7);
		let slots: Vec<Arc<Mutex<u32>>> = std::thread::scope(|s| {
			let handles: Vec<_> = (0..8u32).map(|t| s.spawn(move || pool.get_or_insert_with(key, || t))).collect();
			handles.into_iter().map(|h| h.join().unwrap()).collect()
		});
		assert!(slots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
		assert_eq!(pool.len(), 1);
	}
}
