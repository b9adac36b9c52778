//! Configuration for a mirroring run
//!
//! All tunables arrive here; the engine itself never parses CLI arguments
//! or environment. The configuration follows a priority chain:
//! 1. Built-in defaults (SyncConfig::default())
//! 2. Config file (TOML), when one is loaded

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent transfer workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default change-watcher poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default per-object size limit above which files are chunked (1 GiB)
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 1 << 30;

/// Default interval between pending-work snapshots in milliseconds
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 30_000;

/// Unified configuration for one mirroring run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	/// Root directories under observation
	pub watch_roots: Vec<PathBuf>,

	/// Size of the bounded transfer-worker pool
	pub worker_count: usize,

	/// Change-watcher poll interval in milliseconds
	pub poll_interval_ms: u64,

	/// Files larger than this are transferred as chunks plus a manifest
	pub chunk_threshold: u64,

	/// Exclusion rule file (one glob per line), if any
	pub exclusion_file: Option<PathBuf>,

	/// Where to snapshot the pending-work list; no snapshotting when unset
	pub snapshot_path: Option<PathBuf>,

	/// Interval between periodic snapshots in milliseconds
	pub snapshot_interval_ms: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		SyncConfig {
			watch_roots: Vec::new(),
			worker_count: DEFAULT_WORKER_COUNT,
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
			exclusion_file: None,
			snapshot_path: None,
			snapshot_interval_ms: DEFAULT_SNAPSHOT_INTERVAL_MS,
		}
	}
}

impl SyncConfig {
	/// Load configuration from a TOML file, falling back to defaults for
	/// any omitted field.
	pub async fn load(path: &Path) -> Result<Self, SyncError> {
		let contents = tokio::fs::read_to_string(path).await?;
		let config: SyncConfig = toml::from_str(&contents)
			.map_err(|e| SyncError::InvalidConfig { message: format!("{}: {}", path.display(), e) })?;
		config.validate()?;
		Ok(config)
	}

	/// Validate the configuration
	pub fn validate(&self) -> Result<(), SyncError> {
		if self.watch_roots.is_empty() {
			return Err(SyncError::InvalidConfig { message: "no watch roots configured".into() });
		}
		for root in &self.watch_roots {
			if !root.is_absolute() {
				return Err(SyncError::InvalidConfig {
					message: format!("watch root must be absolute: {}", root.display()),
				});
			}
		}
		if self.worker_count == 0 {
			return Err(SyncError::InvalidConfig { message: "worker_count must be > 0".into() });
		}
		if self.chunk_threshold == 0 {
			return Err(SyncError::InvalidConfig { message: "chunk_threshold must be > 0".into() });
		}
		if self.poll_interval_ms == 0 {
			return Err(SyncError::InvalidConfig { message: "poll_interval_ms must be > 0".into() });
		}
		Ok(())
	}

	/// Watcher poll interval as a Duration
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	/// Snapshot interval as a Duration
	pub fn snapshot_interval(&self) -> Duration {
		Duration::from_millis(self.snapshot_interval_ms)
	}
}


// vim: ts=4
