//! # UpSync - Continuous Directory-Tree Mirroring
//!
//! UpSync continuously mirrors local directory trees into a remote content
//! store: it detects additions and modifications, deduplicates in-flight
//! work, and transfers files (including files larger than the store's
//! per-object limit) while surviving process restarts without losing or
//! duplicating work.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use upsync::{LocalDirEndpoint, SyncConfig, SyncManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig {
//!         watch_roots: vec!["/data/projects".into()],
//!         ..Default::default()
//!     };
//!     let endpoint = Arc::new(LocalDirEndpoint::new("/mnt/mirror"));
//!
//!     let mut manager = SyncManager::new(config, endpoint).await?;
//!     manager.begin_sync().await?;
//!     // ... run until shutdown ...
//!     manager.end_sync().await?;
//!
//!     let ctx = manager.context();
//!     println!("synced {} files, {} failed", ctx.status.succeeded(), ctx.status.failed_count());
//!     Ok(())
//! }
//! ```

pub mod changed_list;
pub mod chunking;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod manager;
pub mod status;
pub mod util;
pub mod walker;
pub mod watcher;
pub mod worker;

// Re-export commonly used types and functions
pub use changed_list::{ChangeRecord, ChangedList};
pub use chunking::{ChunkManifest, ChunkStream, ContentChunk};
pub use config::SyncConfig;
pub use context::SyncContext;
pub use endpoint::{LocalDirEndpoint, SyncEndpoint};
pub use error::{ChunkError, EndpointError, StateError, SyncError};
pub use exclusion::FileExclusionManager;
pub use manager::SyncManager;
pub use status::StatusManager;
pub use walker::DirectoryWalker;
pub use watcher::{ChangeHandler, ChangeWatcher};
pub use worker::{SyncResult, SyncWorker};

// vim: ts=4
