//! Bounded-size chunking of oversized files
//!
//! Files above the store's per-object limit are transferred as a
//! deterministic sequence of bounded-size chunks plus a manifest describing
//! reassembly. [`ChunkStream`] yields chunks lazily, forward-only, hashing
//! each byte range incrementally while reading; the whole file is never
//! buffered.

use crate::error::ChunkError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Suffix inserted between the original object name and the chunk index
pub const CHUNK_SUFFIX: &str = ".ddss";

/// Suffix of the companion manifest object
pub const MANIFEST_SUFFIX: &str = ".ddss-manifest";

/// Identifier of the checksum algorithm recorded in manifests
pub const CHECKSUM_ALGORITHM: &str = "blake3";

const READ_BUF_SIZE: usize = 64 * 1024;

/// Derived name of chunk `index` (1-based) of an object.
///
/// Zero-padded to four digits so chunk names sort in transfer order and
/// cannot collide with the original name.
pub fn chunk_name(original_name: &str, index: u32) -> String {
	format!("{}{}{:04}", original_name, CHUNK_SUFFIX, index)
}

/// Derived name of the manifest object for a chunked file
pub fn manifest_name(original_name: &str) -> String {
	format!("{}{}", original_name, MANIFEST_SUFFIX)
}

/// One bounded-size piece of an oversized file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
	/// Source file the byte range belongs to
	pub path: PathBuf,

	/// 1-based sequence index
	pub index: u32,

	/// Byte offset within the source file
	pub offset: u64,

	/// Byte length of the range
	pub size: u64,

	/// Hex blake3 checksum over the byte range
	pub checksum: String,

	/// Derived chunk object name
	pub name: String,
}

/// Lazy, finite, forward-only chunk producer over one file
pub struct ChunkStream {
	file: tokio::fs::File,
	path: PathBuf,
	original_name: String,
	max_chunk_size: u64,
	total_size: u64,
	offset: u64,
	next_index: u32,
}

impl ChunkStream {
	/// Open `path` for chunked reading with the given bound on chunk size.
	pub async fn open(path: &Path, remote_name: &str, max_chunk_size: u64) -> Result<Self, ChunkError> {
		if max_chunk_size == 0 {
			return Err(ChunkError::InvalidConfig { message: "max chunk size must be > 0".into() });
		}
		let file = tokio::fs::File::open(path).await?;
		let total_size = file.metadata().await?.len();

		Ok(ChunkStream {
			file,
			path: path.to_path_buf(),
			original_name: remote_name.to_string(),
			max_chunk_size,
			total_size,
			offset: 0,
			next_index: 1,
		})
	}

	/// Total size of the underlying file in bytes
	pub fn total_size(&self) -> u64 {
		self.total_size
	}

	/// Number of chunks this stream will yield: ceil(size / max_chunk_size)
	pub fn chunk_count(&self) -> u32 {
		if self.total_size == 0 {
			return 0;
		}
		((self.total_size + self.max_chunk_size - 1) / self.max_chunk_size) as u32
	}

	/// Read and hash the next chunk. Returns None once the file is
	/// exhausted.
	pub async fn next_chunk(&mut self) -> Result<Option<ContentChunk>, ChunkError> {
		if self.offset >= self.total_size {
			return Ok(None);
		}

		let size = (self.total_size - self.offset).min(self.max_chunk_size);
		let mut hasher = blake3::Hasher::new();
		let mut buffer = vec![0u8; READ_BUF_SIZE];
		let mut read_total: u64 = 0;

		while read_total < size {
			let want = ((size - read_total) as usize).min(READ_BUF_SIZE);
			let n = self.file.read(&mut buffer[..want]).await?;
			if n == 0 {
				// File shrank underneath us since open
				return Err(ChunkError::ReadFailed {
					source: std::io::Error::new(
						std::io::ErrorKind::UnexpectedEof,
						format!(
							"{} truncated at offset {}",
							self.path.display(),
							self.offset + read_total
						),
					),
				});
			}
			hasher.update(&buffer[..n]);
			read_total += n as u64;
		}

		let chunk = ContentChunk {
			path: self.path.clone(),
			index: self.next_index,
			offset: self.offset,
			size,
			checksum: hex::encode(hasher.finalize().as_bytes()),
			name: chunk_name(&self.original_name, self.next_index),
		};

		self.offset += size;
		self.next_index += 1;
		Ok(Some(chunk))
	}
}

/// One chunk entry in a manifest, in chunk order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
	/// Chunk object name
	pub name: String,

	/// Hex checksum of the chunk's byte range
	pub checksum: String,

	/// Byte size of the chunk
	pub size: u64,
}

/// Reassembly description for one chunked file, uploaded as a companion
/// object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
	/// Name of the original (unchunked) object
	pub original_name: String,

	/// Total size of the original file in bytes
	pub total_size: u64,

	/// Number of chunks
	pub chunk_count: u32,

	/// Checksum algorithm identifier
	pub checksum_algorithm: String,

	/// Chunk entries in reassembly order
	pub chunks: Vec<ManifestEntry>,
}

impl ChunkManifest {
	/// Build a manifest from the chunks of one file, in yield order.
	pub fn build(original_name: &str, total_size: u64, chunks: &[ContentChunk]) -> Self {
		ChunkManifest {
			original_name: original_name.to_string(),
			total_size,
			chunk_count: chunks.len() as u32,
			checksum_algorithm: CHECKSUM_ALGORITHM.to_string(),
			chunks: chunks
				.iter()
				.map(|c| ManifestEntry { name: c.name.clone(), checksum: c.checksum.clone(), size: c.size })
				.collect(),
		}
	}

	/// Serialize for upload
	pub fn to_bytes(&self) -> Result<Vec<u8>, ChunkError> {
		serde_json::to_vec(self)
			.map_err(|e| ChunkError::ManifestCorrupted { message: e.to_string() })
	}

	/// Parse and validate a manifest produced by [`to_bytes`].
	///
	/// [`to_bytes`]: ChunkManifest::to_bytes
	pub fn parse(bytes: &[u8]) -> Result<Self, ChunkError> {
		let manifest: ChunkManifest = serde_json::from_slice(bytes)
			.map_err(|e| ChunkError::ManifestCorrupted { message: e.to_string() })?;

		if manifest.chunk_count as usize != manifest.chunks.len() {
			return Err(ChunkError::ManifestCorrupted {
				message: format!(
					"header says {} chunks, {} listed",
					manifest.chunk_count,
					manifest.chunks.len()
				),
			});
		}
		let listed: u64 = manifest.chunks.iter().map(|c| c.size).sum();
		if listed != manifest.total_size {
			return Err(ChunkError::ManifestCorrupted {
				message: format!("chunk sizes sum to {}, header says {}", listed, manifest.total_size),
			});
		}
		Ok(manifest)
	}

	/// Name of the manifest object itself
	pub fn name(&self) -> String {
		manifest_name(&self.original_name)
	}
}


// vim: ts=4
