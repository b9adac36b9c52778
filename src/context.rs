//! Per-run shared state
//!
//! One [`SyncContext`] is constructed per synchronization run and handed by
//! `Arc` to every component: walker, watcher, workers. There is no global
//! mutable state anywhere in the engine.

use crate::changed_list::ChangedList;
use crate::config::SyncConfig;
use crate::exclusion::FileExclusionManager;
use crate::status::StatusManager;
use std::path::{Path, PathBuf};

/// Shared state of one synchronization run
#[derive(Debug)]
pub struct SyncContext {
	/// Run configuration, immutable once the run starts
	pub config: SyncConfig,

	/// Pending-work list
	pub changed: ChangedList,

	/// Run counters
	pub status: StatusManager,

	/// Compiled exclusion rules
	pub exclusions: FileExclusionManager,
}

impl SyncContext {
	/// Build the context for one run
	pub fn new(config: SyncConfig, exclusions: FileExclusionManager) -> Self {
		SyncContext { config, changed: ChangedList::new(), status: StatusManager::new(), exclusions }
	}

	/// Queue a path for sync, keeping the queued counter accurate.
	///
	/// Returns true when the path was newly queued, false when it coalesced
	/// into an existing record.
	pub fn enqueue(&self, path: &Path) -> bool {
		let newly_queued = self.changed.add_changed_file(path);
		if newly_queued {
			self.status.record_queued();
		}
		newly_queued
	}

	/// Re-surface a reserved (typically failed) path for another attempt,
	/// keeping the queued counter accurate. This is the hook an explicit
	/// retry policy calls; the engine never requeues a failure on its own.
	pub fn requeue(&self, path: &Path) {
		self.changed.requeue(path);
		self.status.record_queued();
	}

	/// Watch root owning `path`, by longest matching prefix
	pub fn watch_dir_for(&self, path: &Path) -> Option<&PathBuf> {
		self.config
			.watch_roots
			.iter()
			.filter(|root| path.starts_with(root))
			.max_by_key(|root| root.components().count())
	}

	/// Store-relative identifier for `path`: the path relative to its watch
	/// root, `/`-separated. None for paths outside every watch root.
	pub fn remote_id_for(&self, path: &Path) -> Option<String> {
		let root = self.watch_dir_for(path)?;
		let rel = path.strip_prefix(root).ok()?;
		if rel.as_os_str().is_empty() {
			return None;
		}
		Some(
			rel.components()
				.map(|c| c.as_os_str().to_string_lossy())
				.collect::<Vec<_>>()
				.join("/"),
		)
	}
}


// vim: ts=4
