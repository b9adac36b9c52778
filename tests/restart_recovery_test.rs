use std::sync::Arc;
use std::time::Duration;
use upsync::{ChangedList, LocalDirEndpoint, SyncConfig, SyncEndpoint, SyncManager};

async fn until<F: Fn() -> bool>(what: &str, cond: F) {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
	while !cond() {
		if tokio::time::Instant::now() > deadline {
			panic!("timed out waiting for {}", what);
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restored_snapshot_work_is_synced_on_next_run() {
	let source = tempfile::TempDir::new().unwrap();
	let store = tempfile::TempDir::new().unwrap();
	let state = tempfile::TempDir::new().unwrap();
	let root = source.path();
	let snapshot = state.path().join("pending.json");

	tokio::fs::write(root.join("a.txt"), b"present on disk").await.unwrap();
	tokio::fs::write(root.join("b.txt"), b"also present").await.unwrap();

	// Emulate a previous process that queued work and snapshotted before
	// dying: one path the next scan will also find, one it will not
	let previous = ChangedList::new();
	previous.add_changed_file(&root.join("a.txt"));
	previous.add_changed_file(&root.join("ghost.txt"));
	previous.persist(&snapshot).await.unwrap();

	let config = SyncConfig {
		watch_roots: vec![root.to_path_buf()],
		poll_interval_ms: 10,
		worker_count: 2,
		snapshot_path: Some(snapshot.clone()),
		snapshot_interval_ms: 50,
		..Default::default()
	};
	let endpoint = Arc::new(LocalDirEndpoint::new(store.path()));
	let mut manager = SyncManager::new(config, endpoint.clone()).await.unwrap();
	let ctx = manager.context();

	manager.begin_sync().await.unwrap();
	// a.txt and b.txt sync; ghost.txt no longer exists locally and fails
	until("disk files synced and ghost failed", || {
		ctx.status.succeeded() == 2 && ctx.status.failed_count() == 1
	})
	.await;
	manager.end_sync().await.unwrap();

	assert_eq!(endpoint.list().await.unwrap(), vec!["a.txt", "b.txt"]);
	let failed = ctx.status.failed();
	assert_eq!(failed[0].path, root.join("ghost.txt"));

	// The final snapshot holds only queued records; the failed path is
	// still reserved and therefore not carried over
	let after = ChangedList::new();
	assert_eq!(after.restore(&snapshot).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_periodic_snapshot_is_written_during_run() {
	let source = tempfile::TempDir::new().unwrap();
	let store = tempfile::TempDir::new().unwrap();
	let state = tempfile::TempDir::new().unwrap();
	let snapshot = state.path().join("deep/pending.json");

	let config = SyncConfig {
		watch_roots: vec![source.path().to_path_buf()],
		poll_interval_ms: 10,
		snapshot_path: Some(snapshot.clone()),
		snapshot_interval_ms: 20,
		..Default::default()
	};
	let endpoint = Arc::new(LocalDirEndpoint::new(store.path()));
	let mut manager = SyncManager::new(config, endpoint).await.unwrap();

	manager.begin_sync().await.unwrap();
	until("snapshot file appears", || snapshot.exists()).await;
	manager.end_sync().await.unwrap();

	// Still present (and empty) after the final snapshot on shutdown
	let list = ChangedList::new();
	assert_eq!(list.restore(&snapshot).await.unwrap(), 0);
}

#[tokio::test]
async fn test_corrupt_snapshot_does_not_block_startup() {
	let source = tempfile::TempDir::new().unwrap();
	let store = tempfile::TempDir::new().unwrap();
	let state = tempfile::TempDir::new().unwrap();
	let root = source.path();
	let snapshot = state.path().join("pending.json");

	tokio::fs::write(root.join("a.txt"), b"data").await.unwrap();
	tokio::fs::write(&snapshot, b"]]]] not json").await.unwrap();

	let config = SyncConfig {
		watch_roots: vec![root.to_path_buf()],
		poll_interval_ms: 10,
		snapshot_path: Some(snapshot),
		..Default::default()
	};
	let endpoint = Arc::new(LocalDirEndpoint::new(store.path()));
	let mut manager = SyncManager::new(config, endpoint.clone()).await.unwrap();
	let ctx = manager.context();

	manager.begin_sync().await.unwrap();
	until("scan proceeds past corrupt snapshot", || ctx.status.succeeded() == 1).await;
	manager.end_sync().await.unwrap();

	assert_eq!(endpoint.list().await.unwrap(), vec!["a.txt"]);
}

// vim: ts=4
