//! Per-file transfer unit
//!
//! A [`SyncWorker`] takes one reserved change record through the pipeline:
//! exclusion check, local checksum, skip-unchanged probe, whole-or-chunked
//! transfer, checksum verification. Every failure is converted into a
//! [`SyncResult`]; nothing escapes a worker task. Terminal bookkeeping
//! (releasing the record, updating the counters) happens here, so the
//! dispatcher only ever submits and forgets.

use crate::changed_list::ChangeRecord;
use crate::chunking::{ChunkManifest, ChunkStream, ContentChunk};
use crate::context::SyncContext;
use crate::endpoint::SyncEndpoint;
use crate::error::SyncError;
use crate::logging::*;
use crate::util::{hash_bytes, hash_file};
use std::sync::Arc;

/// Terminal outcome of one file's sync attempt
#[derive(Debug)]
pub enum SyncResult {
	/// Content delivered and verified
	Success,

	/// Transfer failed; the record stays reserved for an explicit retry
	Failed(SyncError),

	/// Path matches the exclusion rules; not an error
	Excluded,

	/// Remote store already holds identical content
	SkippedUnchanged,
}

/// One file-transfer task
pub struct SyncWorker {
	ctx: Arc<SyncContext>,
	endpoint: Arc<dyn SyncEndpoint>,
	record: ChangeRecord,
}

impl SyncWorker {
	/// Create a worker owning one reserved record
	pub fn new(ctx: Arc<SyncContext>, endpoint: Arc<dyn SyncEndpoint>, record: ChangeRecord) -> Self {
		SyncWorker { ctx, endpoint, record }
	}

	/// Run the transfer to its terminal outcome, updating the pending-work
	/// list and the status counters accordingly.
	pub async fn run(self) -> SyncResult {
		self.ctx.status.starting_work();
		let path = self.record.path.clone();

		let result = match self.attempt().await {
			Ok(result) => result,
			Err(e) => SyncResult::Failed(e),
		};

		match &result {
			SyncResult::Success | SyncResult::SkippedUnchanged | SyncResult::Excluded => {
				if !self.ctx.changed.release(&path) {
					// Re-detected while we held the reservation; it is
					// queued again and counts as such
					self.ctx.status.record_queued();
				}
				self.ctx.status.successful_completion();
				debug!("{}: {:?}", path.display(), result);
			}
			SyncResult::Failed(cause) => {
				// The record intentionally stays reserved; re-surfacing a
				// failed path is an explicit requeue by the caller's retry
				// policy, never automatic.
				self.ctx.status.failed_completion(&path, cause);
				warn!("Sync of {} failed: {}", path.display(), cause);
			}
		}
		result
	}

	async fn attempt(&self) -> Result<SyncResult, SyncError> {
		let path = &self.record.path;

		let remote_id = match self.ctx.remote_id_for(path) {
			Some(id) => id,
			None => {
				return Err(SyncError::Other {
					message: format!("{} is outside every watch root", path.display()),
				})
			}
		};

		// Producers filter too, but a path can be enqueued manually or by a
		// producer with stale rules
		if self.ctx.exclusions.is_excluded(std::path::Path::new(&remote_id)) {
			return Ok(SyncResult::Excluded);
		}

		// Local I/O errors surface here, before any endpoint call
		let size = tokio::fs::metadata(path).await?.len();
		let local_checksum = hash_file(path).await?;

		if let Some(remote) = self.endpoint.checksum(&remote_id).await? {
			if remote == local_checksum {
				return Ok(SyncResult::SkippedUnchanged);
			}
		}

		if size > self.ctx.config.chunk_threshold {
			self.transfer_chunked(&remote_id, size).await?;
		} else {
			let reported = self.endpoint.transfer(path, &remote_id).await?;
			verify(&remote_id, &local_checksum, &reported)?;
		}

		Ok(SyncResult::Success)
	}

	/// Transfer an oversized file as bounded-size chunks plus a manifest
	async fn transfer_chunked(&self, remote_id: &str, size: u64) -> Result<(), SyncError> {
		let threshold = self.ctx.config.chunk_threshold;
		let mut stream = ChunkStream::open(&self.record.path, remote_id, threshold).await?;
		info!(
			"Chunking {} ({} bytes) into {} objects",
			self.record.path.display(),
			size,
			stream.chunk_count()
		);

		let mut chunks: Vec<ContentChunk> = Vec::with_capacity(stream.chunk_count() as usize);
		while let Some(chunk) = stream.next_chunk().await? {
			let reported = self.endpoint.transfer_chunk(&chunk, &chunk.name).await?;
			verify(&chunk.name, &chunk.checksum, &reported)?;
			chunks.push(chunk);
		}

		let manifest = ChunkManifest::build(remote_id, stream.total_size(), &chunks);
		let bytes = manifest.to_bytes()?;
		let reported = self.endpoint.transfer_bytes(&bytes, &manifest.name()).await?;
		verify(&manifest.name(), &hash_bytes(&bytes), &reported)?;
		Ok(())
	}
}

/// Compare a store-reported checksum against the locally computed one
fn verify(remote_id: &str, expected: &str, actual: &str) -> Result<(), SyncError> {
	if expected == actual {
		Ok(())
	} else {
		Err(SyncError::ChecksumMismatch {
			remote_id: remote_id.to_string(),
			expected: expected.to_string(),
			actual: actual.to_string(),
		})
	}
}


// vim: ts=4
