//! The pending-work list
//!
//! [`ChangedList`] is the central structure every producer feeds and every
//! worker drains: a coalescing, order-preserving queue of paths needing
//! sync, with reservation semantics. At most one record exists per path; a
//! reserved record is checked out by exactly one worker. The list is the
//! only structure in the engine requiring a synchronization discipline:
//! one mutex over the inner state, plus a lock-free version counter so
//! watchers can detect "nothing changed" without contending.
//!
//! Workers hold a [`ChangeRecord`] by value, never a reference into the
//! list, and hand the outcome back through `release`/`requeue`.

use crate::error::StateError;
use crate::logging::*;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry as MapEntry;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A pending-sync unit of work, identified by path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
	/// Absolute path of the changed file
	pub path: PathBuf,

	/// Detection time, milliseconds since the Unix epoch. Re-detection of
	/// the same path overwrites this (last write wins).
	pub detected_at: u64,
}

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
	Queued,
	// dirty: the path was re-detected while reserved and must be
	// re-processed once the current reservation completes
	Reserved { dirty: bool },
}

#[derive(Debug)]
struct Entry {
	detected_at: u64,
	state: EntryState,
}

#[derive(Debug, Default)]
struct Inner {
	entries: HashMap<PathBuf, Entry>,
	// FIFO of queued (non-reserved) paths; holds exactly the paths whose
	// entry state is Queued, in insertion order
	queue: VecDeque<PathBuf>,
}

/// Concurrent, deduplicating, order-preserving, persistable queue of files
/// needing sync
#[derive(Debug, Default)]
pub struct ChangedList {
	inner: Mutex<Inner>,
	version: AtomicU64,
}

/// One queued record in a persisted snapshot
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
	path: PathBuf,
	detected_at: u64,
}

impl ChangedList {
	/// Create an empty list
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or coalesce a change record for `path`.
	///
	/// Returns true when a new queued record was created, false when an
	/// existing record was coalesced (timestamp updated). Re-detection of a
	/// reserved path leaves the reservation untouched and marks the record
	/// for re-processing after the reservation completes.
	pub fn add_changed_file(&self, path: &Path) -> bool {
		self.add_with_timestamp(path, now_ms())
	}

	fn add_with_timestamp(&self, path: &Path, detected_at: u64) -> bool {
		let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		let inner = &mut *guard;
		let newly_queued = match inner.entries.entry(path.to_path_buf()) {
			MapEntry::Occupied(mut occupied) => {
				let entry = occupied.get_mut();
				entry.detected_at = detected_at;
				if let EntryState::Reserved { dirty } = &mut entry.state {
					*dirty = true;
				}
				false
			}
			MapEntry::Vacant(vacant) => {
				vacant.insert(Entry { detected_at, state: EntryState::Queued });
				inner.queue.push_back(path.to_path_buf());
				true
			}
		};
		drop(guard);
		self.version.fetch_add(1, Ordering::Release);
		newly_queued
	}

	/// Atomically take the oldest queued record and mark it reserved.
	///
	/// Returns None when nothing is queued. A given record is handed to
	/// exactly one caller.
	pub fn reserve(&self) -> Option<ChangeRecord> {
		let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		let path = inner.queue.pop_front()?;
		let entry = inner
			.entries
			.get_mut(&path)
			.expect("queued path missing from entry map");
		entry.state = EntryState::Reserved { dirty: false };
		let record = ChangeRecord { path, detected_at: entry.detected_at };
		drop(inner);
		self.version.fetch_add(1, Ordering::Release);
		Some(record)
	}

	/// Complete a reservation terminally: the path leaves the list, unless
	/// it was re-detected while reserved, in which case it goes back to the
	/// queue tail with the updated timestamp.
	///
	/// Returns true when the record was removed, false when it was requeued
	/// for re-processing.
	///
	/// Panics if `path` is not currently reserved; that is a programming
	/// error, not a runtime condition.
	pub fn release(&self, path: &Path) -> bool {
		let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		let inner = &mut *guard;
		let state = inner.entries.get(path).expect("release of unknown path").state;
		let removed = match state {
			EntryState::Reserved { dirty: false } => {
				inner.entries.remove(path);
				true
			}
			EntryState::Reserved { dirty: true } => {
				inner.entries.get_mut(path).expect("entry vanished").state = EntryState::Queued;
				inner.queue.push_back(path.to_path_buf());
				false
			}
			EntryState::Queued => panic!("release of non-reserved path {}", path.display()),
		};
		drop(guard);
		self.version.fetch_add(1, Ordering::Release);
		removed
	}

	/// Move a reserved record back to the queue tail without completing it.
	/// Used by the watcher for rejected dispatches and by explicit retry
	/// policies re-surfacing failed paths.
	///
	/// Panics if `path` is not currently reserved.
	pub fn requeue(&self, path: &Path) {
		let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		let inner = &mut *guard;
		let state = inner.entries.get(path).expect("requeue of unknown path").state;
		match state {
			EntryState::Reserved { .. } => {
				inner.entries.get_mut(path).expect("entry vanished").state = EntryState::Queued;
				inner.queue.push_back(path.to_path_buf());
			}
			EntryState::Queued => panic!("requeue of non-reserved path {}", path.display()),
		}
		drop(guard);
		self.version.fetch_add(1, Ordering::Release);
	}

	/// Count of queued (non-reserved) records
	pub fn len(&self) -> usize {
		self.inner.lock().unwrap_or_else(|e| e.into_inner()).queue.len()
	}

	/// Count of queued plus reserved records
	pub fn len_including_reserved(&self) -> usize {
		self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
	}

	/// True when no records are queued
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Monotonically increasing mutation counter, readable without locking
	pub fn version(&self) -> u64 {
		self.version.load(Ordering::Acquire)
	}

	/// Snapshot the queued (non-reserved) records to `path` as JSON.
	///
	/// Reserved-but-uncompleted records are intentionally not persisted;
	/// after a crash they are re-detected by the next run's initial scan.
	pub async fn persist(&self, path: &Path) -> Result<(), StateError> {
		let snapshot: Vec<SnapshotEntry> = {
			let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
			inner
				.queue
				.iter()
				.map(|p| SnapshotEntry {
					path: p.clone(),
					detected_at: inner.entries[p].detected_at,
				})
				.collect()
		};

		let json = serde_json::to_string(&snapshot)
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		if let Some(parent) = path.parent() {
			if !parent.exists() {
				tokio::fs::create_dir_all(parent)
					.await
					.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
			}
		}

		tokio::fs::write(path, json)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })
	}

	/// Restore queued records from a snapshot written by [`persist`].
	///
	/// Records coalesce with whatever is already in the list. A missing
	/// snapshot restores nothing; a corrupt one is logged and treated as
	/// empty rather than failing the run. Returns the number of records
	/// read from the snapshot.
	///
	/// [`persist`]: ChangedList::persist
	pub async fn restore(&self, path: &Path) -> Result<usize, StateError> {
		if !path.exists() {
			return Ok(0);
		}

		let contents = tokio::fs::read_to_string(path)
			.await
			.map_err(|e| StateError::LoadFailed { source: Box::new(e) })?;

		let snapshot: Vec<SnapshotEntry> = match serde_json::from_str(&contents) {
			Ok(s) => s,
			Err(e) => {
				warn!("Discarding corrupt pending-work snapshot {}: {}", path.display(), e);
				return Ok(0);
			}
		};

		let count = snapshot.len();
		for entry in snapshot {
			self.add_with_timestamp(&entry.path, entry.detected_at);
		}
		Ok(count)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_add_and_reserve_fifo() {
		let list = ChangedList::new();
		list.add_changed_file(Path::new("/a"));
		list.add_changed_file(Path::new("/b"));
		list.add_changed_file(Path::new("/c"));

		assert_eq!(list.reserve().unwrap().path, PathBuf::from("/a"));
		assert_eq!(list.reserve().unwrap().path, PathBuf::from("/b"));
		assert_eq!(list.reserve().unwrap().path, PathBuf::from("/c"));
		assert!(list.reserve().is_none());
	}

	#[test]
	fn test_coalescing_keeps_one_record() {
		let list = ChangedList::new();
		assert!(list.add_changed_file(Path::new("/a")));
		assert!(!list.add_changed_file(Path::new("/a")));
		assert!(!list.add_changed_file(Path::new("/a")));

		assert_eq!(list.len(), 1);
		list.reserve().unwrap();
		assert!(list.reserve().is_none());
	}

	#[test]
	fn test_coalescing_takes_last_timestamp() {
		let list = ChangedList::new();
		list.add_with_timestamp(Path::new("/a"), 100);
		list.add_with_timestamp(Path::new("/a"), 250);

		let record = list.reserve().unwrap();
		assert_eq!(record.detected_at, 250);
	}

	#[test]
	fn test_release_drops_record() {
		let list = ChangedList::new();
		list.add_changed_file(Path::new("/a/b.txt"));
		assert_eq!(list.len(), 1);

		let record = list.reserve().unwrap();
		assert_eq!(list.len(), 0);
		assert_eq!(list.len_including_reserved(), 1);

		assert!(list.release(&record.path));
		assert_eq!(list.len(), 0);
		assert_eq!(list.len_including_reserved(), 0);
	}

	#[test]
	fn test_redetection_while_reserved_requeues_on_release() {
		let list = ChangedList::new();
		list.add_with_timestamp(Path::new("/a"), 100);
		let record = list.reserve().unwrap();

		// Re-detected mid-transfer: reservation unaffected, no second entry
		list.add_with_timestamp(Path::new("/a"), 200);
		assert_eq!(list.len(), 0);
		assert_eq!(list.len_including_reserved(), 1);
		assert!(list.reserve().is_none());

		// Completing the stale transfer re-surfaces the path
		assert!(!list.release(&record.path));
		assert_eq!(list.len(), 1);
		let again = list.reserve().unwrap();
		assert_eq!(again.path, PathBuf::from("/a"));
		assert_eq!(again.detected_at, 200);
	}

	#[test]
	fn test_requeue_returns_record_to_tail() {
		let list = ChangedList::new();
		list.add_changed_file(Path::new("/a"));
		list.add_changed_file(Path::new("/b"));

		let first = list.reserve().unwrap();
		list.requeue(&first.path);

		assert_eq!(list.reserve().unwrap().path, PathBuf::from("/b"));
		assert_eq!(list.reserve().unwrap().path, PathBuf::from("/a"));
	}

	#[test]
	#[should_panic(expected = "release of unknown path")]
	fn test_release_of_unknown_path_panics() {
		let list = ChangedList::new();
		list.release(Path::new("/never-added"));
	}

	#[test]
	#[should_panic(expected = "release of non-reserved path")]
	fn test_release_of_queued_path_panics() {
		let list = ChangedList::new();
		list.add_changed_file(Path::new("/a"));
		list.release(Path::new("/a"));
	}

	#[test]
	fn test_version_increments_on_mutation() {
		let list = ChangedList::new();
		let v0 = list.version();

		list.add_changed_file(Path::new("/a"));
		let v1 = list.version();
		assert!(v1 > v0);

		// Coalescing is a mutation too
		list.add_changed_file(Path::new("/a"));
		let v2 = list.version();
		assert!(v2 > v1);

		list.reserve().unwrap();
		assert!(list.version() > v2);
	}

	#[tokio::test]
	async fn test_persist_restore_round_trip() {
		let dir = tempfile::TempDir::new().unwrap();
		let snapshot = dir.path().join("pending.json");

		let list = ChangedList::new();
		list.add_with_timestamp(Path::new("/w/a.txt"), 10);
		list.add_with_timestamp(Path::new("/w/b.txt"), 20);
		// Reserved records must not be persisted
		list.add_with_timestamp(Path::new("/w/c.txt"), 30);
		let reserved = list.reserve().unwrap();
		assert_eq!(reserved.path, PathBuf::from("/w/a.txt"));

		list.persist(&snapshot).await.unwrap();

		let restored = ChangedList::new();
		let count = restored.restore(&snapshot).await.unwrap();
		assert_eq!(count, 2);
		assert_eq!(restored.len(), 2);

		let first = restored.reserve().unwrap();
		assert_eq!(first.path, PathBuf::from("/w/b.txt"));
		assert_eq!(first.detected_at, 20);
		assert_eq!(restored.reserve().unwrap().path, PathBuf::from("/w/c.txt"));
	}

	#[tokio::test]
	async fn test_restore_missing_snapshot_is_empty() {
		let dir = tempfile::TempDir::new().unwrap();
		let list = ChangedList::new();
		let count = list.restore(&dir.path().join("nope.json")).await.unwrap();
		assert_eq!(count, 0);
		assert_eq!(list.len(), 0);
	}

	#[tokio::test]
	async fn test_restore_corrupt_snapshot_is_empty() {
		let dir = tempfile::TempDir::new().unwrap();
		let snapshot = dir.path().join("pending.json");
		tokio::fs::write(&snapshot, "{not json at all").await.unwrap();

		let list = ChangedList::new();
		let count = list.restore(&snapshot).await.unwrap();
		assert_eq!(count, 0);
		assert_eq!(list.len(), 0);
	}
}

// vim: ts=4
