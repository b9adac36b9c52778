//! Run orchestration
//!
//! [`SyncManager`] binds everything to one synchronization run: it builds
//! the per-run [`SyncContext`], spawns the initial [`DirectoryWalker`],
//! runs a [`ChangeWatcher`] whose handler submits one [`SyncWorker`] per
//! reserved record into a semaphore-bounded pool, and periodically
//! snapshots the pending-work list. `end_sync` stops the producers, drains
//! the pool, and leaves the status counters intact for the caller.

use crate::changed_list::ChangeRecord;
use crate::config::SyncConfig;
use crate::context::SyncContext;
use crate::endpoint::SyncEndpoint;
use crate::error::SyncError;
use crate::exclusion::FileExclusionManager;
use crate::logging::*;
use crate::walker::DirectoryWalker;
use crate::watcher::{ChangeHandler, ChangeWatcher};
use crate::worker::SyncWorker;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// Handler that submits one worker per reserved record into the bounded
/// pool. Acquiring a permit here, before accepting the dispatch, is what
/// backpressures the watcher when all workers are busy.
struct PoolDispatcher {
	ctx: Arc<SyncContext>,
	endpoint: Arc<dyn SyncEndpoint>,
	permits: Arc<Semaphore>,
	tasks: Arc<Mutex<JoinSet<()>>>,
	draining: AtomicBool,
}

#[async_trait]
impl ChangeHandler for PoolDispatcher {
	async fn handle_changed_file(&self, record: ChangeRecord) -> bool {
		if self.draining.load(Ordering::Acquire) {
			return false;
		}
		let permit = match self.permits.clone().acquire_owned().await {
			Ok(permit) => permit,
			Err(_) => return false,
		};

		let worker = SyncWorker::new(self.ctx.clone(), self.endpoint.clone(), record);
		self.tasks.lock().await.spawn(async move {
			let _permit = permit;
			worker.run().await;
		});
		true
	}
}

/// Orchestrator of one synchronization run
pub struct SyncManager {
	ctx: Arc<SyncContext>,
	endpoint: Arc<dyn SyncEndpoint>,
	tasks: Arc<Mutex<JoinSet<()>>>,
	walker: Option<Arc<DirectoryWalker>>,
	watcher: Option<Arc<ChangeWatcher>>,
	dispatcher: Option<Arc<PoolDispatcher>>,
	snapshot_stop: Option<Arc<Notify>>,
	handles: Vec<JoinHandle<()>>,
	running: bool,
}

impl SyncManager {
	/// Build a manager for one run. Validates the configuration and
	/// compiles the exclusion rule file, when one is configured.
	pub async fn new(config: SyncConfig, endpoint: Arc<dyn SyncEndpoint>) -> Result<Self, SyncError> {
		config.validate()?;
		let exclusions = match &config.exclusion_file {
			Some(path) => FileExclusionManager::from_file(path).await?,
			None => FileExclusionManager::empty(),
		};

		Ok(SyncManager {
			ctx: Arc::new(SyncContext::new(config, exclusions)),
			endpoint,
			tasks: Arc::new(Mutex::new(JoinSet::new())),
			walker: None,
			watcher: None,
			dispatcher: None,
			snapshot_stop: None,
			handles: Vec::new(),
			running: false,
		})
	}

	/// The run's shared context: status counters, pending-work list,
	/// manual enqueue and requeue hooks.
	pub fn context(&self) -> Arc<SyncContext> {
		self.ctx.clone()
	}

	/// Watch root owning `path`, by longest matching prefix
	pub fn watch_dir_for(&self, path: &Path) -> Option<&PathBuf> {
		self.ctx.watch_dir_for(path)
	}

	/// Running count of files discovered by the initial scan
	pub fn files_walked(&self) -> u64 {
		self.walker.as_ref().map(|w| w.files_seen()).unwrap_or(0)
	}

	/// Start the run: restore any previous pending-work snapshot, then
	/// spawn the walker, the watcher with its worker pool, and the
	/// periodic snapshot task.
	pub async fn begin_sync(&mut self) -> Result<(), SyncError> {
		if self.running {
			return Err(SyncError::Other { message: "sync already running".into() });
		}

		// Restore before the walker starts so work queued by a previous
		// process is not hidden behind the fresh scan
		if let Some(snapshot) = self.ctx.config.snapshot_path.clone() {
			let restored = self.ctx.changed.restore(&snapshot).await?;
			if restored > 0 {
				info!("Restored {} pending paths from {}", restored, snapshot.display());
				for _ in 0..restored {
					self.ctx.status.record_queued();
				}
			}
		}

		let dispatcher = Arc::new(PoolDispatcher {
			ctx: self.ctx.clone(),
			endpoint: self.endpoint.clone(),
			permits: Arc::new(Semaphore::new(self.ctx.config.worker_count)),
			tasks: self.tasks.clone(),
			draining: AtomicBool::new(false),
		});
		let watcher = Arc::new(ChangeWatcher::new(
			self.ctx.clone(),
			dispatcher.clone(),
			self.ctx.config.poll_interval(),
		));
		let walker = Arc::new(DirectoryWalker::new(self.ctx.clone()));

		self.handles.push(tokio::spawn({
			let walker = walker.clone();
			async move { walker.run().await }
		}));
		self.handles.push(tokio::spawn({
			let watcher = watcher.clone();
			async move { watcher.run().await }
		}));

		if let Some(snapshot) = self.ctx.config.snapshot_path.clone() {
			let stop = Arc::new(Notify::new());
			let interval = self.ctx.config.snapshot_interval();
			let ctx = self.ctx.clone();
			self.handles.push(tokio::spawn({
				let stop = stop.clone();
				async move {
					loop {
						tokio::select! {
							_ = tokio::time::sleep(interval) => {
								if let Err(e) = ctx.changed.persist(&snapshot).await {
									warn!("Pending-work snapshot failed: {}", e);
								}
							}
							_ = stop.notified() => break,
						}
					}
				}
			}));
			self.snapshot_stop = Some(stop);
		}

		self.walker = Some(walker);
		self.watcher = Some(watcher);
		self.dispatcher = Some(dispatcher);
		self.running = true;
		info!("Sync run started over {} watch roots", self.ctx.config.watch_roots.len());
		Ok(())
	}

	/// End the run: stop walker and watcher, await every outstanding
	/// worker, write a final snapshot. Counters stay intact; inspect them
	/// through [`context`].
	///
	/// Cancellation is cooperative throughout; in-flight transfers run to
	/// completion rather than being aborted.
	///
	/// [`context`]: SyncManager::context
	pub async fn end_sync(&mut self) -> Result<(), SyncError> {
		if !self.running {
			return Ok(());
		}

		if let Some(walker) = &self.walker {
			walker.stop_walk();
		}
		if let Some(watcher) = &self.watcher {
			watcher.end_watch();
		}
		if let Some(dispatcher) = &self.dispatcher {
			dispatcher.draining.store(true, Ordering::Release);
		}
		if let Some(stop) = &self.snapshot_stop {
			stop.notify_one();
		}

		for handle in self.handles.drain(..) {
			if let Err(e) = handle.await {
				error!("Run task failed: {}", e);
			}
		}

		let mut tasks = self.tasks.lock().await;
		while let Some(joined) = tasks.join_next().await {
			if let Err(e) = joined {
				error!("Worker task failed: {}", e);
			}
		}
		drop(tasks);

		if let Some(snapshot) = &self.ctx.config.snapshot_path {
			self.ctx.changed.persist(snapshot).await?;
		}

		self.running = false;
		info!(
			"Sync run ended: {} succeeded, {} failed, {} still pending",
			self.ctx.status.succeeded(),
			self.ctx.status.failed_count(),
			self.ctx.changed.len_including_reserved()
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::endpoint::LocalDirEndpoint;
	use std::time::Duration;

	async fn until<F: Fn() -> bool>(what: &str, cond: F) {
		let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
		while !cond() {
			if tokio::time::Instant::now() > deadline {
				panic!("timed out waiting for {}", what);
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	}

	#[tokio::test]
	async fn test_full_run_mirrors_tree() {
		let source = tempfile::TempDir::new().unwrap();
		let store = tempfile::TempDir::new().unwrap();
		tokio::fs::create_dir_all(source.path().join("sub")).await.unwrap();
		tokio::fs::write(source.path().join("a.txt"), b"alpha").await.unwrap();
		tokio::fs::write(source.path().join("sub/b.txt"), b"beta").await.unwrap();

		let config = SyncConfig {
			watch_roots: vec![source.path().to_path_buf()],
			poll_interval_ms: 10,
			worker_count: 2,
			..Default::default()
		};
		let endpoint = Arc::new(LocalDirEndpoint::new(store.path()));
		let mut manager = SyncManager::new(config, endpoint.clone()).await.unwrap();

		manager.begin_sync().await.unwrap();
		let ctx = manager.context();
		until("all files synced", || ctx.status.succeeded() == 2).await;
		manager.end_sync().await.unwrap();

		assert_eq!(endpoint.list().await.unwrap(), vec!["a.txt", "sub/b.txt"]);
		assert_eq!(ctx.status.failed_count(), 0);
		assert_eq!(ctx.changed.len_including_reserved(), 0);
	}

	#[tokio::test]
	async fn test_begin_twice_is_rejected() {
		let source = tempfile::TempDir::new().unwrap();
		let store = tempfile::TempDir::new().unwrap();
		let config = SyncConfig {
			watch_roots: vec![source.path().to_path_buf()],
			poll_interval_ms: 10,
			..Default::default()
		};
		let endpoint = Arc::new(LocalDirEndpoint::new(store.path()));
		let mut manager = SyncManager::new(config, endpoint).await.unwrap();

		manager.begin_sync().await.unwrap();
		assert!(manager.begin_sync().await.is_err());
		manager.end_sync().await.unwrap();
	}

	#[tokio::test]
	async fn test_end_sync_without_begin_is_noop() {
		let source = tempfile::TempDir::new().unwrap();
		let store = tempfile::TempDir::new().unwrap();
		let config = SyncConfig {
			watch_roots: vec![source.path().to_path_buf()],
			..Default::default()
		};
		let endpoint = Arc::new(LocalDirEndpoint::new(store.path()));
		let mut manager = SyncManager::new(config, endpoint).await.unwrap();
		manager.end_sync().await.unwrap();
	}
}

// vim: ts=4
