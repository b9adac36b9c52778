//! The abstract remote-store contract
//!
//! The engine never talks to network or storage APIs directly; every remote
//! write goes through [`SyncEndpoint`]. Provider adapters (S3, Azure,
//! Swift, REST stores) live outside this crate and implement this trait;
//! [`LocalDirEndpoint`] is the in-tree reference implementation.

mod local;

pub use local::LocalDirEndpoint;

use crate::chunking::ContentChunk;
use crate::error::EndpointError;
use async_trait::async_trait;
use std::path::Path;

/// Result type for endpoint operations
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Abstract sync endpoint the engine transfers content through.
///
/// Identifiers are store-relative, `/`-separated object names. Every
/// transfer returns the checksum the store computed over what it actually
/// received, which the caller compares against its own; the engine treats a
/// mismatch as a data-integrity failure, not a transport error.
#[async_trait]
pub trait SyncEndpoint: Send + Sync {
	/// Transfer a whole local file as one remote object. Returns the
	/// store-side checksum of the stored object.
	async fn transfer(&self, local_file: &Path, remote_id: &str) -> EndpointResult<String>;

	/// Transfer one chunk of a local file. Returns the store-side checksum
	/// of the stored chunk object.
	async fn transfer_chunk(&self, chunk: &ContentChunk, remote_id: &str) -> EndpointResult<String>;

	/// Transfer an in-memory buffer (used for chunk manifests). Returns the
	/// store-side checksum of the stored object.
	async fn transfer_bytes(&self, data: &[u8], remote_id: &str) -> EndpointResult<String>;

	/// Whether an object with this identifier exists in the store
	async fn exists(&self, remote_id: &str) -> EndpointResult<bool>;

	/// Store-side checksum of an existing object, None when absent
	async fn checksum(&self, remote_id: &str) -> EndpointResult<Option<String>>;

	/// Identifiers of all objects currently in the store
	async fn list(&self) -> EndpointResult<Vec<String>>;
}

// vim: ts=4
