//! Run-wide status counters
//!
//! One [`StatusManager`] is created per mirroring run and shared by every
//! producer and worker. Counters are independently atomic; the failed list
//! is the only mutex-guarded piece and the lock is never held across I/O.
//! A run's final outcome is fully recoverable from here without logs.

use crate::error::SyncError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One failed sync attempt
#[derive(Debug, Clone)]
pub struct FailedSync {
	/// Path that failed to transfer
	pub path: PathBuf,

	/// Human-readable cause
	pub cause: String,

	/// Whether a retry of the same transfer could plausibly succeed
	pub retryable: bool,
}

/// Per-run sync status
#[derive(Debug, Default)]
pub struct StatusManager {
	queued: AtomicUsize,
	in_work: AtomicUsize,
	succeeded: AtomicUsize,
	failed: Mutex<Vec<FailedSync>>,
}

impl StatusManager {
	/// Create a fresh status manager with zeroed counters
	pub fn new() -> Self {
		Self::default()
	}

	/// A producer queued one path for sync
	pub fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}

	/// A worker picked up one queued path
	pub fn starting_work(&self) {
		// Saturating: a restored snapshot may hand workers paths that were
		// queued in a previous process lifetime.
		let _ = self.queued.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |q| {
			Some(q.saturating_sub(1))
		});
		self.in_work.fetch_add(1, Ordering::Relaxed);
	}

	/// A worker finished one path successfully
	pub fn successful_completion(&self) {
		self.in_work.fetch_sub(1, Ordering::Relaxed);
		self.succeeded.fetch_add(1, Ordering::Relaxed);
	}

	/// A worker failed one path
	pub fn failed_completion(&self, path: &Path, cause: &SyncError) {
		self.in_work.fetch_sub(1, Ordering::Relaxed);
		let entry = FailedSync {
			path: path.to_path_buf(),
			cause: cause.to_string(),
			retryable: cause.is_retryable(),
		};
		self.failed.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
	}

	/// Paths queued and not yet picked up
	pub fn queued(&self) -> usize {
		self.queued.load(Ordering::Relaxed)
	}

	/// Paths currently being transferred
	pub fn in_work(&self) -> usize {
		self.in_work.load(Ordering::Relaxed)
	}

	/// Paths that reached a terminal success outcome
	pub fn succeeded(&self) -> usize {
		self.succeeded.load(Ordering::Relaxed)
	}

	/// Number of failed paths
	pub fn failed_count(&self) -> usize {
		self.failed.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	/// Snapshot of the failed list
	pub fn failed(&self) -> Vec<FailedSync> {
		self.failed.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	/// Zero all counters and drop the failed list. Only the owner of a run
	/// should call this, between runs.
	pub fn reset(&self) {
		self.queued.store(0, Ordering::Relaxed);
		self.in_work.store(0, Ordering::Relaxed);
		self.succeeded.store(0, Ordering::Relaxed);
		self.failed.lock().unwrap_or_else(|e| e.into_inner()).clear();
	}
}


// vim: ts=4
