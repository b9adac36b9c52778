//! Local-directory endpoint
//!
//! Stores objects as plain files under a base directory. This is the
//! reference [`SyncEndpoint`] implementation: it exercises the whole
//! contract without any network, which also makes it the endpoint the test
//! suite mirrors into.

use super::{EndpointResult, SyncEndpoint};
use crate::chunking::ContentChunk;
use crate::error::EndpointError;
use crate::util::hash_file;
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Endpoint backed by a directory on the local filesystem
#[derive(Debug)]
pub struct LocalDirEndpoint {
	base: PathBuf,
}

impl LocalDirEndpoint {
	/// Create an endpoint storing objects under `base`
	pub fn new(base: impl Into<PathBuf>) -> Self {
		LocalDirEndpoint { base: base.into() }
	}

	/// Map a remote identifier to a path under the base directory.
	///
	/// Identifiers are relative `/`-separated names; anything absolute,
	/// empty, or escaping the base via `..` is rejected.
	fn resolve(&self, remote_id: &str) -> EndpointResult<PathBuf> {
		if remote_id.is_empty() {
			return Err(EndpointError::InvalidIdentifier { remote_id: remote_id.to_string() });
		}
		let rel = Path::new(remote_id);
		let acceptable = rel
			.components()
			.all(|c| matches!(c, Component::Normal(_)));
		if !acceptable {
			return Err(EndpointError::InvalidIdentifier { remote_id: remote_id.to_string() });
		}
		Ok(self.base.join(rel))
	}

	async fn prepare_target(&self, remote_id: &str) -> EndpointResult<PathBuf> {
		let target = self.resolve(remote_id)?;
		if let Some(parent) = target.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(|e| {
				EndpointError::TransferFailed { remote_id: remote_id.to_string(), source: Box::new(e) }
			})?;
		}
		Ok(target)
	}

	async fn stored_checksum(&self, target: &Path, remote_id: &str) -> EndpointResult<String> {
		hash_file(target).await.map_err(|e| EndpointError::TransferFailed {
			remote_id: remote_id.to_string(),
			source: Box::new(e),
		})
	}
}

#[async_trait]
impl SyncEndpoint for LocalDirEndpoint {
	async fn transfer(&self, local_file: &Path, remote_id: &str) -> EndpointResult<String> {
		let target = self.prepare_target(remote_id).await?;
		tokio::fs::copy(local_file, &target).await.map_err(|e| {
			EndpointError::TransferFailed { remote_id: remote_id.to_string(), source: Box::new(e) }
		})?;
		self.stored_checksum(&target, remote_id).await
	}

	async fn transfer_chunk(&self, chunk: &ContentChunk, remote_id: &str) -> EndpointResult<String> {
		let target = self.prepare_target(remote_id).await?;

		let copy = async {
			let mut source = tokio::fs::File::open(&chunk.path).await?;
			source.seek(SeekFrom::Start(chunk.offset)).await?;
			let mut out = tokio::fs::File::create(&target).await?;

			let mut buffer = vec![0u8; COPY_BUF_SIZE];
			let mut remaining = chunk.size;
			while remaining > 0 {
				let want = (remaining as usize).min(COPY_BUF_SIZE);
				let n = source.read(&mut buffer[..want]).await?;
				if n == 0 {
					return Err(std::io::Error::new(
						std::io::ErrorKind::UnexpectedEof,
						format!("{} truncated mid-chunk", chunk.path.display()),
					));
				}
				out.write_all(&buffer[..n]).await?;
				remaining -= n as u64;
			}
			out.flush().await
		};

		copy.await.map_err(|e: std::io::Error| EndpointError::TransferFailed {
			remote_id: remote_id.to_string(),
			source: Box::new(e),
		})?;

		self.stored_checksum(&target, remote_id).await
	}

	async fn transfer_bytes(&self, data: &[u8], remote_id: &str) -> EndpointResult<String> {
		let target = self.prepare_target(remote_id).await?;
		tokio::fs::write(&target, data).await.map_err(|e| {
			EndpointError::TransferFailed { remote_id: remote_id.to_string(), source: Box::new(e) }
		})?;
		self.stored_checksum(&target, remote_id).await
	}

	async fn exists(&self, remote_id: &str) -> EndpointResult<bool> {
		let target = self.resolve(remote_id)?;
		Ok(tokio::fs::metadata(&target).await.is_ok())
	}

	async fn checksum(&self, remote_id: &str) -> EndpointResult<Option<String>> {
		let target = self.resolve(remote_id)?;
		if tokio::fs::metadata(&target).await.is_err() {
			return Ok(None);
		}
		self.stored_checksum(&target, remote_id).await.map(Some)
	}

	async fn list(&self) -> EndpointResult<Vec<String>> {
		let mut ids = Vec::new();
		if tokio::fs::metadata(&self.base).await.is_err() {
			return Ok(ids);
		}

		let mut stack = vec![self.base.clone()];
		while let Some(dir) = stack.pop() {
			let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
				EndpointError::Unavailable { message: format!("{}: {}", dir.display(), e) }
			})?;
			while let Some(entry) = entries.next_entry().await.map_err(|e| {
				EndpointError::Unavailable { message: format!("{}: {}", dir.display(), e) }
			})? {
				let path = entry.path();
				if path.is_dir() {
					stack.push(path);
				} else if let Ok(rel) = path.strip_prefix(&self.base) {
					let id = rel
						.components()
						.map(|c| c.as_os_str().to_string_lossy())
						.collect::<Vec<_>>()
						.join("/");
					ids.push(id);
				}
			}
		}

		ids.sort();
		Ok(ids)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chunking::ChunkStream;
	use crate::util::hash_bytes;

	#[tokio::test]
	async fn test_transfer_and_checksum() {
		let store = tempfile::TempDir::new().unwrap();
		let src = tempfile::TempDir::new().unwrap();
		let file = src.path().join("a.txt");
		tokio::fs::write(&file, b"payload").await.unwrap();

		let endpoint = LocalDirEndpoint::new(store.path());
		let checksum = endpoint.transfer(&file, "docs/a.txt").await.unwrap();
		assert_eq!(checksum, hash_bytes(b"payload"));

		assert!(endpoint.exists("docs/a.txt").await.unwrap());
		assert_eq!(endpoint.checksum("docs/a.txt").await.unwrap(), Some(checksum));
		assert_eq!(endpoint.checksum("docs/missing.txt").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_transfer_chunk_copies_exact_range() {
		let store = tempfile::TempDir::new().unwrap();
		let src = tempfile::TempDir::new().unwrap();
		let file = src.path().join("big.bin");
		let content: Vec<u8> = (0..5000u32).map(|i| (i % 241) as u8).collect();
		tokio::fs::write(&file, &content).await.unwrap();

		let endpoint = LocalDirEndpoint::new(store.path());
		let mut stream = ChunkStream::open(&file, "big.bin", 2000).await.unwrap();
		while let Some(chunk) = stream.next_chunk().await.unwrap() {
			let returned = endpoint.transfer_chunk(&chunk, &chunk.name).await.unwrap();
			assert_eq!(returned, chunk.checksum);
		}

		let ids = endpoint.list().await.unwrap();
		assert_eq!(ids, vec!["big.bin.ddss0001", "big.bin.ddss0002", "big.bin.ddss0003"]);

		// Concatenating stored chunks in name order reproduces the file
		let mut reassembled = Vec::new();
		for id in ids {
			let stored = store.path().join(&id);
			reassembled.extend(tokio::fs::read(&stored).await.unwrap());
		}
		assert_eq!(reassembled, content);
	}

	#[tokio::test]
	async fn test_rejects_escaping_identifiers() {
		let store = tempfile::TempDir::new().unwrap();
		let endpoint = LocalDirEndpoint::new(store.path());

		assert!(endpoint.exists("../outside").await.is_err());
		assert!(endpoint.exists("/absolute").await.is_err());
		assert!(endpoint.exists("").await.is_err());
	}

	#[tokio::test]
	async fn test_list_empty_store() {
		let store = tempfile::TempDir::new().unwrap();
		let endpoint = LocalDirEndpoint::new(store.path().join("not-created-yet"));
		assert_eq!(endpoint.list().await.unwrap(), Vec::<String>::new());
	}
}

// vim: ts=4
