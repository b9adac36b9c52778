//! Initial directory scan
//!
//! [`DirectoryWalker`] is the one-shot producer that feeds pre-existing
//! files into the pending-work list as synthetic changes at the start of a
//! run. Live filesystem-event producers cover everything after that; the
//! walker never runs twice.

use crate::context::SyncContext;
use crate::logging::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One-shot recursive scanner over the watch roots
#[derive(Debug)]
pub struct DirectoryWalker {
	ctx: Arc<SyncContext>,
	files_seen: AtomicU64,
	stop: AtomicBool,
	started: AtomicBool,
}

impl DirectoryWalker {
	/// Create a walker for the context's watch roots
	pub fn new(ctx: Arc<SyncContext>) -> Self {
		DirectoryWalker {
			ctx,
			files_seen: AtomicU64::new(0),
			stop: AtomicBool::new(false),
			started: AtomicBool::new(false),
		}
	}

	/// Running count of regular files fed into the pending-work list
	pub fn files_seen(&self) -> u64 {
		self.files_seen.load(Ordering::Relaxed)
	}

	/// Ask the walk to stop; observed between directory levels, so the walk
	/// may enqueue a few more entries before it ends.
	pub fn stop_walk(&self) {
		self.stop.store(true, Ordering::Release);
	}

	/// Perform the walk. Finite and non-restartable: a second call is a
	/// no-op; construct a fresh walker to re-scan.
	pub async fn run(&self) {
		if self.started.swap(true, Ordering::AcqRel) {
			warn!("Directory walk already performed; ignoring repeat run");
			return;
		}

		let mut stack: Vec<(PathBuf, PathBuf)> = self
			.ctx
			.config
			.watch_roots
			.iter()
			.map(|root| (root.clone(), root.clone()))
			.collect();
		// Deepest-first is fine; ordering across roots carries no guarantee
		stack.reverse();

		while let Some((dir, root)) = stack.pop() {
			if self.stop.load(Ordering::Acquire) {
				info!("Directory walk cancelled after {} files", self.files_seen());
				return;
			}
			self.scan_dir(&dir, &root, &mut stack).await;
		}

		info!("Directory walk complete: {} files queued for sync", self.files_seen());
	}

	/// Enumerate one directory, queueing files and pushing subdirectories.
	/// Per-entry errors are logged and skipped; an unreadable directory
	/// never fails the walk.
	async fn scan_dir(&self, dir: &Path, root: &Path, stack: &mut Vec<(PathBuf, PathBuf)>) {
		let mut entries = match tokio::fs::read_dir(dir).await {
			Ok(entries) => entries,
			Err(e) => {
				warn!("Skipping unreadable directory {}: {}", dir.display(), e);
				return;
			}
		};

		loop {
			let entry = match entries.next_entry().await {
				Ok(Some(entry)) => entry,
				Ok(None) => break,
				Err(e) => {
					warn!("Aborting listing of {}: {}", dir.display(), e);
					break;
				}
			};

			let path = entry.path();
			let rel = path.strip_prefix(root).unwrap_or(&path);
			if self.ctx.exclusions.is_excluded(rel) {
				debug!("Excluded from scan: {}", path.display());
				continue;
			}

			let file_type = match entry.file_type().await {
				Ok(ft) => ft,
				Err(e) => {
					warn!("Skipping {}: {}", path.display(), e);
					continue;
				}
			};

			if file_type.is_dir() {
				stack.push((path, root.to_path_buf()));
			} else if file_type.is_file() {
				self.ctx.enqueue(&path);
				self.files_seen.fetch_add(1, Ordering::Relaxed);
			}
			// Symlinks and special files are not mirrored
		}
	}
}


// vim: ts=4
